use log::*;

use crate::api::XvcError;

/* Bitstream reader for the decoder, mirroring the encoder's writer bit for
 * bit. Running off the end of the buffer is a malformed-bitstream error. */
pub(crate) struct XvcdBsr<'a> {
    buf: &'a [u8],
    byte_pos: usize,
    /* bits consumed from the current byte */
    bit_pos: u32,
}

impl<'a> XvcdBsr<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        XvcdBsr {
            buf,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    pub fn byte_align(&mut self) {
        if self.bit_pos != 0 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
    }

    /* number of whole bytes consumed */
    pub fn get_read_bytes(&self) -> usize {
        self.byte_pos + if self.bit_pos > 0 { 1 } else { 0 }
    }

    pub fn read1(&mut self) -> Result<u32, XvcError> {
        if self.byte_pos >= self.buf.len() {
            trace!("already reached the end of bitstream");
            return Err(XvcError::XVC_ERR_MALFORMED_BITSTREAM);
        }
        let bit = (self.buf[self.byte_pos] >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
        Ok(bit as u32)
    }

    pub fn read(&mut self, len: u32) -> Result<u32, XvcError> {
        debug_assert!(len > 0 && len <= 32);
        let mut code = 0;
        for _ in 0..len {
            code = (code << 1) | self.read1()?;
        }
        Ok(code)
    }

    pub fn read_ue(&mut self) -> Result<u32, XvcError> {
        let mut leading_zeros = 0;
        while self.read1()? == 0 {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(XvcError::XVC_ERR_MALFORMED_BITSTREAM);
            }
        }
        if leading_zeros == 0 {
            return Ok(0);
        }
        let info = self.read(leading_zeros)?;
        Ok((1u32 << leading_zeros) + info - 1)
    }

    pub fn read_se(&mut self) -> Result<i32, XvcError> {
        let val = self.read_ue()? as i32;
        if (val & 0x1) != 0 {
            Ok((val + 1) >> 1)
        } else {
            Ok(-(val >> 1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enc::bsw::XvceBsw;
    use crate::enc::eco::SyntaxWriter;

    #[test]
    fn reader_mirrors_writer() {
        let mut bsw = XvceBsw::new();
        bsw.write1(1);
        bsw.write(0x2a, 7);
        bsw.write_ue(0);
        bsw.write_ue(17);
        bsw.write_se(-4);
        bsw.write_se(9);
        let data = bsw.take_data();

        let mut bsr = XvcdBsr::new(&data);
        assert_eq!(bsr.read1().unwrap(), 1);
        assert_eq!(bsr.read(7).unwrap(), 0x2a);
        assert_eq!(bsr.read_ue().unwrap(), 0);
        assert_eq!(bsr.read_ue().unwrap(), 17);
        assert_eq!(bsr.read_se().unwrap(), -4);
        assert_eq!(bsr.read_se().unwrap(), 9);
    }

    #[test]
    fn overrun_is_malformed() {
        let data = [0xffu8];
        let mut bsr = XvcdBsr::new(&data);
        assert!(bsr.read(8).is_ok());
        assert_eq!(bsr.read1(), Err(XvcError::XVC_ERR_MALFORMED_BITSTREAM));
    }
}
