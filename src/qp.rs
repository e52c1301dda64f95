use crate::def::*;
use crate::util::*;

pub(crate) const QUANT_SHIFT: u32 = 14;
pub(crate) const QUANT_SCALE: [u32; 6] = [26214, 23302, 20560, 18396, 16384, 14564];
pub(crate) const INV_QUANT_SCALE: [i32; 6] = [40, 45, 51, 57, 64, 72];

lazy_static! {
    /* luma qp to chroma qp, flat up to 29 then compressed */
    static ref xvc_tbl_chroma_qp: [i32; (MAX_ALLOWED_QP + 1) as usize] = {
        let mut tbl = [0; (MAX_ALLOWED_QP + 1) as usize];
        for qp in 0..=MAX_ALLOWED_QP {
            let c = if qp < 30 {
                qp
            } else if qp < 44 {
                29 + (qp - 29) * 2 / 3
            } else {
                qp - 5
            };
            tbl[qp as usize] = XVC_CLIP3(0, MAX_ALLOWED_QP, c);
        }
        tbl
    };
}

/* Quantization parameter with the derived rate weight. One instance is
 * shared by a whole CTU during the rdo search. */
#[derive(Clone, Copy, Debug)]
pub(crate) struct Qp {
    qp_raw: [i32; N_C],
    lambda: f64,
    lambda_sqrt: f64,
}

impl Default for Qp {
    fn default() -> Self {
        Qp::new(32)
    }
}

impl Qp {
    pub fn new(qp: i32) -> Self {
        let qp = XVC_CLIP3(MIN_ALLOWED_QP, MAX_ALLOWED_QP, qp);
        let chroma_qp = xvc_tbl_chroma_qp[qp as usize];
        let lambda = 0.57 * 2f64.powf((qp - 12) as f64 / 3.0);
        Qp {
            qp_raw: [qp, chroma_qp, chroma_qp],
            lambda,
            lambda_sqrt: lambda.sqrt(),
        }
    }

    #[inline]
    pub fn get_qp_raw(&self, comp: YuvComponent) -> i32 {
        self.qp_raw[comp.idx()]
    }

    #[inline]
    pub fn get_lambda(&self) -> f64 {
        self.lambda
    }

    #[inline]
    pub fn get_lambda_sqrt(&self) -> f64 {
        self.lambda_sqrt
    }

    /* forward scale and down-shift for one component */
    #[inline]
    pub fn get_fwd_scale(&self, comp: YuvComponent) -> (u32, u32) {
        let qp = self.qp_raw[comp.idx()];
        (QUANT_SCALE[(qp % 6) as usize], QUANT_SHIFT + (qp / 6) as u32)
    }

    /* inverse scale and up-shift for one component */
    #[inline]
    pub fn get_inv_scale(&self, comp: YuvComponent) -> (i32, u32) {
        let qp = self.qp_raw[comp.idx()];
        (INV_QUANT_SCALE[(qp % 6) as usize], (qp / 6) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chroma_qp_flat_below_30() {
        let qp = Qp::new(22);
        assert_eq!(qp.get_qp_raw(YuvComponent::Y), 22);
        assert_eq!(qp.get_qp_raw(YuvComponent::U), 22);
    }

    #[test]
    fn chroma_qp_compressed() {
        let qp = Qp::new(37);
        assert!(qp.get_qp_raw(YuvComponent::U) < 37);
    }

    #[test]
    fn lambda_monotonic() {
        assert!(Qp::new(32).get_lambda() > Qp::new(22).get_lambda());
    }

    #[test]
    fn qp_clipped_to_range() {
        assert_eq!(Qp::new(99).get_qp_raw(YuvComponent::Y), MAX_ALLOWED_QP);
        assert_eq!(Qp::new(-10).get_qp_raw(YuvComponent::Y), MIN_ALLOWED_QP);
    }
}
