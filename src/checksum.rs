use crate::def::*;
use crate::frame::Frame;

/* Reconstructed-picture hash, embedded in the bitstream by the encoder and
 * verified by the decoder during post-processing. Components are hashed in
 * (Y,U,V) order, row major, at the picture bitdepth. */

#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum ChecksumMethod {
    None = 0,
    Crc = 1,
    Md5 = 2,
}

impl ChecksumMethod {
    pub fn hash_size(self) -> usize {
        match self {
            ChecksumMethod::None => 0,
            ChecksumMethod::Crc => 4,
            ChecksumMethod::Md5 => 16,
        }
    }

    pub fn from_u8(v: u8) -> Option<ChecksumMethod> {
        match v {
            0 => Some(ChecksumMethod::None),
            1 => Some(ChecksumMethod::Crc),
            2 => Some(ChecksumMethod::Md5),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Checksum {
    method: ChecksumMethod,
    hash: Vec<u8>,
}

/* equality is defined on the hash bytes only; the method is informational */
impl PartialEq for Checksum {
    fn eq(&self, other: &Checksum) -> bool {
        self.hash == other.hash
    }
}

impl Checksum {
    pub fn new(method: ChecksumMethod) -> Self {
        Checksum {
            method,
            hash: vec![],
        }
    }

    pub fn from_hash(method: ChecksumMethod, hash: Vec<u8>) -> Self {
        Checksum { method, hash }
    }

    pub fn get_method(&self) -> ChecksumMethod {
        self.method
    }

    pub fn get_hash(&self) -> &[u8] {
        &self.hash
    }

    pub fn clear(&mut self) {
        self.hash.clear();
    }

    pub fn hash_picture(&mut self, pic: &Frame) {
        self.hash.clear();
        let high_bitdepth = pic.bitdepth > 8;
        match self.method {
            ChecksumMethod::None => {}
            ChecksumMethod::Crc => {
                let mut crc = Crc32::new();
                for c in 0..pic.num_components() {
                    hash_comp(&mut crc, &pic.planes[c].data, high_bitdepth);
                }
                self.hash.extend_from_slice(&crc.finish().to_le_bytes());
            }
            ChecksumMethod::Md5 => {
                let mut md5 = Md5::new();
                for c in 0..pic.num_components() {
                    hash_comp(&mut md5, &pic.planes[c].data, high_bitdepth);
                }
                self.hash.extend_from_slice(&md5.finish());
            }
        }
    }
}

trait ByteHasher {
    fn update(&mut self, data: &[u8]);
}

fn hash_comp<H: ByteHasher>(hasher: &mut H, samples: &[pel], high_bitdepth: bool) {
    if high_bitdepth {
        let mut row = Vec::with_capacity(samples.len() * 2);
        for &s in samples {
            row.push((s & 0xff) as u8);
            row.push((s >> 8) as u8);
        }
        hasher.update(&row);
    } else {
        let row: Vec<u8> = samples.iter().map(|&s| s as u8).collect();
        hasher.update(&row);
    }
}

/*****************************************************************************
 * CRC-32 (IEEE, reflected)
 *****************************************************************************/

lazy_static! {
    static ref crc32_tbl: [u32; 256] = {
        let mut tbl = [0u32; 256];
        for i in 0..256u32 {
            let mut c = i;
            for _ in 0..8 {
                c = if c & 1 != 0 { 0xEDB88320 ^ (c >> 1) } else { c >> 1 };
            }
            tbl[i as usize] = c;
        }
        tbl
    };
}

struct Crc32 {
    state: u32,
}

impl Crc32 {
    fn new() -> Self {
        Crc32 { state: 0xFFFFFFFF }
    }

    fn finish(self) -> u32 {
        self.state ^ 0xFFFFFFFF
    }
}

impl ByteHasher for Crc32 {
    fn update(&mut self, data: &[u8]) {
        let mut c = self.state;
        for &b in data {
            c = crc32_tbl[((c ^ b as u32) & 0xff) as usize] ^ (c >> 8);
        }
        self.state = c;
    }
}

/*****************************************************************************
 * MD5 (RFC 1321)
 *****************************************************************************/

const MD5_S: [u32; 64] = [
    7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, //
    5, 9, 14, 20, 5, 9, 14, 20, 5, 9, 14, 20, 5, 9, 14, 20, //
    4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, //
    6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21,
];

lazy_static! {
    static ref md5_k: [u32; 64] = {
        let mut k = [0u32; 64];
        for i in 0..64 {
            k[i] = (((i as f64 + 1.0).sin().abs()) * 4294967296.0) as u32;
        }
        k
    };
}

struct Md5 {
    state: [u32; 4],
    buf: [u8; 64],
    buf_len: usize,
    total_len: u64,
}

impl Md5 {
    fn new() -> Self {
        Md5 {
            state: [0x67452301, 0xefcdab89, 0x98badcfe, 0x10325476],
            buf: [0; 64],
            buf_len: 0,
            total_len: 0,
        }
    }

    fn process_block(&mut self, block: &[u8]) {
        let mut m = [0u32; 16];
        for i in 0..16 {
            m[i] = u32::from_le_bytes([
                block[i * 4],
                block[i * 4 + 1],
                block[i * 4 + 2],
                block[i * 4 + 3],
            ]);
        }
        let (mut a, mut b, mut c, mut d) =
            (self.state[0], self.state[1], self.state[2], self.state[3]);
        for i in 0..64 {
            let (f, g) = match i / 16 {
                0 => ((b & c) | (!b & d), i),
                1 => ((d & b) | (!d & c), (5 * i + 1) % 16),
                2 => (b ^ c ^ d, (3 * i + 5) % 16),
                _ => (c ^ (b | !d), (7 * i) % 16),
            };
            let tmp = d;
            d = c;
            c = b;
            b = b.wrapping_add(
                a.wrapping_add(f)
                    .wrapping_add(md5_k[i])
                    .wrapping_add(m[g])
                    .rotate_left(MD5_S[i]),
            );
            a = tmp;
        }
        self.state[0] = self.state[0].wrapping_add(a);
        self.state[1] = self.state[1].wrapping_add(b);
        self.state[2] = self.state[2].wrapping_add(c);
        self.state[3] = self.state[3].wrapping_add(d);
    }

    fn finish(mut self) -> [u8; 16] {
        let bit_len = self.total_len.wrapping_mul(8);
        self.update(&[0x80]);
        while self.buf_len != 56 {
            self.update(&[0]);
        }
        let mut block = self.buf;
        block[56..64].copy_from_slice(&bit_len.to_le_bytes());
        self.process_block(&block);
        let mut out = [0u8; 16];
        for i in 0..4 {
            out[i * 4..i * 4 + 4].copy_from_slice(&self.state[i].to_le_bytes());
        }
        out
    }
}

impl ByteHasher for Md5 {
    fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.buf[self.buf_len] = byte;
            self.buf_len += 1;
            self.total_len = self.total_len.wrapping_add(1);
            if self.buf_len == 64 {
                let block = self.buf;
                self.process_block(&block);
                self.buf_len = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    fn md5_of(data: &[u8]) -> [u8; 16] {
        let mut md5 = Md5::new();
        md5.update(data);
        md5.finish()
    }

    #[test]
    fn md5_empty() {
        let expect = [
            0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04, //
            0xe9, 0x80, 0x09, 0x98, 0xec, 0xf8, 0x42, 0x7e,
        ];
        assert_eq!(md5_of(b""), expect);
    }

    #[test]
    fn md5_abc() {
        let expect = [
            0x90, 0x01, 0x50, 0x98, 0x3c, 0xd2, 0x4f, 0xb0, //
            0xd6, 0x96, 0x3f, 0x7d, 0x28, 0xe1, 0x7f, 0x72,
        ];
        assert_eq!(md5_of(b"abc"), expect);
    }

    #[test]
    fn crc32_check_vector() {
        let mut crc = Crc32::new();
        crc.update(b"123456789");
        assert_eq!(crc.finish(), 0xCBF43926);
    }

    #[test]
    fn equality_ignores_method() {
        let a = Checksum::from_hash(ChecksumMethod::Crc, vec![1, 2, 3, 4]);
        let b = Checksum::from_hash(ChecksumMethod::Md5, vec![1, 2, 3, 4]);
        assert_eq!(a, b);
    }

    #[test]
    fn picture_hash_changes_with_content() {
        let mut pic = Frame::new(16, 16, ChromaFormat::CF_420, 8);
        let mut chk1 = Checksum::new(ChecksumMethod::Md5);
        chk1.hash_picture(&pic);
        pic.planes[Y_C].data[0] = 1;
        let mut chk2 = Checksum::new(ChecksumMethod::Md5);
        chk2.hash_picture(&pic);
        assert_ne!(chk1, chk2);
    }
}
