use crate::def::*;
use crate::frame::Frame;
use crate::picman::PictureData;

/* Neighbor sample buffers for intra prediction. `left` runs downwards from
 * the block's top-left, `up` runs rightwards; both extend to w + h samples
 * so the diagonal modes can reach past the block. */
pub(crate) struct NbrSamples {
    pub left: Vec<pel>,
    pub up: Vec<pel>,
    pub top_left: pel,
}

/* Fetch reconstructed neighbor samples, falling back to the half-range
 * value where a neighbor is outside the picture or not yet coded.
 * Availability is tracked at luma granularity in the cu map, which both
 * encoder and decoder maintain in coding order. */
pub(crate) fn xvc_get_nbr(pic_data: &PictureData, rec_pic: &Frame, tree: CuTree,
                          comp: YuvComponent, lx: usize, ly: usize, lw: usize, lh: usize)
                          -> NbrSamples {
    let shift = if comp.is_luma() { 0 } else { 1 };
    let plane = &rec_pic.planes[comp.idx()];
    let (cx, cy) = (lx >> shift, ly >> shift);
    let (cw, ch) = (lw >> shift, lh >> shift);
    let default = (1 << (rec_pic.bitdepth - 1)) as pel;
    let scale = 1 << shift;

    let mut up = vec![default; cw + ch];
    if ly > 0 {
        for i in 0..(cw + ch) {
            let nlx = lx + i * scale;
            if pic_data.get_cu_at(tree, nlx, ly - 1).is_some() {
                up[i] = plane.data[(cy - 1) * plane.width + cx + i];
            }
        }
    }

    let mut left = vec![default; ch + cw];
    if lx > 0 {
        for i in 0..(ch + cw) {
            let nly = ly + i * scale;
            if pic_data.get_cu_at(tree, lx - 1, nly).is_some() {
                left[i] = plane.data[(cy + i) * plane.width + cx - 1];
            }
        }
    }

    let top_left = if lx > 0 && ly > 0 && pic_data.get_cu_at(tree, lx - 1, ly - 1).is_some() {
        plane.data[(cy - 1) * plane.width + cx - 1]
    } else {
        default
    };

    NbrSamples { left, up, top_left }
}

/* intra prediction, baseline directions */
pub(crate) fn xvc_ipred(nbr: &NbrSamples, dst: &mut [pel], ipm: IntraPredDir, w: usize, h: usize) {
    match ipm {
        IntraPredDir::IPD_VER => ipred_vert(&nbr.up, dst, w, h),
        IntraPredDir::IPD_HOR => ipred_hor(&nbr.left, dst, w, h),
        IntraPredDir::IPD_DC => ipred_dc(&nbr.left, &nbr.up, dst, w, h),
        IntraPredDir::IPD_UL => ipred_ul(&nbr.left, &nbr.up, nbr.top_left, dst, w, h),
        IntraPredDir::IPD_UR => ipred_ur(&nbr.left, &nbr.up, dst, w, h),
    }
}

fn ipred_vert(src_up: &[pel], dst: &mut [pel], w: usize, h: usize) {
    for i in 0..h {
        dst[i * w..(i + 1) * w].copy_from_slice(&src_up[0..w]);
    }
}

fn ipred_hor(src_le: &[pel], dst: &mut [pel], w: usize, h: usize) {
    for i in 0..h {
        for v in dst[i * w..(i + 1) * w].iter_mut() {
            *v = src_le[i];
        }
    }
}

fn ipred_dc(src_le: &[pel], src_up: &[pel], dst: &mut [pel], w: usize, h: usize) {
    let mut dc: u32 = 0;
    for i in 0..h {
        dc += src_le[i] as u32;
    }
    for j in 0..w {
        dc += src_up[j] as u32;
    }
    let count = (w + h) as u32;
    let dc = ((dc + count / 2) / count) as pel;

    for v in dst[..w * h].iter_mut() {
        *v = dc;
    }
}

fn ipred_ul(src_le: &[pel], src_up: &[pel], src_tl: pel, dst: &mut [pel], w: usize, h: usize) {
    for i in 0..h {
        for j in 0..w {
            let pos = i * w + j;
            let diag = i as isize - j as isize;
            if diag > 0 {
                dst[pos] = src_le[diag as usize - 1];
            } else if diag == 0 {
                dst[pos] = src_tl;
            } else {
                dst[pos] = src_up[(-diag - 1) as usize];
            }
        }
    }
}

fn ipred_ur(src_le: &[pel], src_up: &[pel], dst: &mut [pel], w: usize, h: usize) {
    for i in 0..h {
        for j in 0..w {
            dst[i * w + j] = (src_up[i + j + 1] + src_le[i + j + 1]) >> 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_is_average() {
        let nbr = NbrSamples {
            left: vec![100; 8],
            up: vec![200; 8],
            top_left: 128,
        };
        let mut dst = vec![0; 16];
        xvc_ipred(&nbr, &mut dst, IntraPredDir::IPD_DC, 4, 4);
        assert!(dst.iter().all(|&v| v == 150));
    }

    #[test]
    fn vertical_copies_top_row() {
        let nbr = NbrSamples {
            left: vec![0; 8],
            up: vec![1, 2, 3, 4, 5, 6, 7, 8],
            top_left: 0,
        };
        let mut dst = vec![0; 16];
        xvc_ipred(&nbr, &mut dst, IntraPredDir::IPD_VER, 4, 4);
        assert_eq!(&dst[0..4], &[1, 2, 3, 4]);
        assert_eq!(&dst[12..16], &[1, 2, 3, 4]);
    }

    #[test]
    fn diagonal_down_right_propagates() {
        let nbr = NbrSamples {
            left: vec![10, 11, 12, 13, 14, 15, 16, 17],
            up: vec![20, 21, 22, 23, 24, 25, 26, 27],
            top_left: 99,
        };
        let mut dst = vec![0; 16];
        xvc_ipred(&nbr, &mut dst, IntraPredDir::IPD_UL, 4, 4);
        /* the main diagonal carries the top-left sample */
        assert_eq!(dst[0], 99);
        assert_eq!(dst[5], 99);
        assert_eq!(dst[1], 20);
        assert_eq!(dst[4], 10);
    }
}
