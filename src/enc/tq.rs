use crate::cu::CodingUnit;
use crate::def::*;
use crate::enc::eco::*;
use crate::enc::sad::*;
use crate::enc::*;
use crate::itdq::*;
use crate::qp::Qp;
use crate::restrictions::Restrictions;
use crate::util::*;

/* Transform-selection engine: given a fixed prediction for one component,
 * choose transform variant / transform skip / cbf-zero and produce the
 * final coefficients and reconstruction. */

pub(crate) fn xvce_fwd_transform(resi: &[i32], coef: &mut [i32], w: usize, h: usize,
                                 tx_select_idx: i8) {
    coef[..w * h].copy_from_slice(&resi[..w * h]);
    if tx_hor_flip(tx_select_idx) {
        for j in 0..h {
            coef[j * w..(j + 1) * w].reverse();
        }
    }
    if tx_ver_flip(tx_select_idx) {
        for i in 0..w {
            for j in 0..h / 2 {
                coef.swap(j * w + i, (h - 1 - j) * w + i);
            }
        }
    }
    let s1 = CONV_LOG2(w) as u32 - 1;
    let s2 = CONV_LOG2(h) as u32 - 1;
    let mut row = vec![0i32; w];
    for j in 0..h {
        row.copy_from_slice(&coef[j * w..(j + 1) * w]);
        xvc_wht(&mut row);
        for i in 0..w {
            coef[j * w + i] = round_shift(row[i], s1);
        }
    }
    let mut col = vec![0i32; h];
    for i in 0..w {
        for j in 0..h {
            col[j] = coef[j * w + i];
        }
        xvc_wht(&mut col);
        for j in 0..h {
            coef[j * w + i] = round_shift(col[j], s2);
        }
    }
}

#[inline]
pub(crate) fn xvce_fwd_transform_skip(resi: &[i32], coef: &mut [i32], len: usize) {
    for i in 0..len {
        coef[i] = resi[i] << 2;
    }
}

/* scalar quantization; the rdo variant weighs one level step down against
 * its rate saving */
pub(crate) fn xvce_quant(qp: &Qp, comp: YuvComponent, src: &[i32], dst: &mut [Coeff], len: usize,
                         is_intra: bool, rdo_quant: bool, lambda: f64) -> u32 {
    let (scale, shift) = qp.get_fwd_scale(comp);
    let (inv_scale, inv_shl) = qp.get_inv_scale(comp);
    let offset: i64 = if rdo_quant {
        1i64 << (shift - 1)
    } else {
        ((if is_intra { 171i64 } else { 85i64 }) << shift) >> 9
    };
    let mut nnz = 0;
    for i in 0..len {
        let c = src[i] as i64;
        let mut level = ((c.abs() * scale as i64 + offset) >> shift) as i32;
        if rdo_quant && level > 0 {
            let dequant = |l: i32| -> i64 { ((l as i64 * inv_scale as i64) << inv_shl) >> 6 };
            let err_keep = c.abs() - dequant(level);
            let err_down = c.abs() - dequant(level - 1);
            let bits_keep = 2 * (32 - (level as u32 + 1).leading_zeros()) as i64;
            let bits_down = if level > 1 {
                2 * (32 - (level as u32).leading_zeros()) as i64
            } else {
                /* dropping to zero also drops the sign bit */
                1
            };
            let lambda_coef = lambda * 16.0;
            let cost_keep = (err_keep * err_keep) as f64 + lambda_coef * bits_keep as f64;
            let cost_down = (err_down * err_down) as f64 + lambda_coef * bits_down as f64;
            if cost_down < cost_keep {
                level -= 1;
            }
        }
        let level = XVC_CLIP3(0, i16::MAX as i32, level);
        dst[i] = if src[i] < 0 { -level as Coeff } else { level as Coeff };
        if level != 0 {
            nnz += 1;
        }
    }
    nnz
}

impl XvceCtx {
    /* normal transform over the select indices, then transform skip, then
     * the tie-break; returns the distortion of the winning configuration */
    pub(crate) fn compress_and_eval_transform(&mut self, cu: &mut CodingUnit, comp: YuvComponent,
                                              qp: &Qp) -> Distortion {
        let restrictions = Restrictions::get();
        let nbr_tx_select: i8 = if comp.is_luma() && !restrictions.disable_ext_transform_select {
            MAX_TRANSFORM_SELECT_IDX
        } else {
            0
        };

        let mut best_cost_normal = COST_MAX;
        let mut best_txselect_normal: i8 = -1;
        for tx_select in -1..nbr_tx_select {
            cu.set_transform_from_select_idx(comp, tx_select);
            let dist_normal = self.transform_and_reconstruct(cu, comp, qp, false);
            let cost = self.get_transform_cost(cu, comp, qp, dist_normal);
            if cost < best_cost_normal {
                best_cost_normal = cost;
                best_txselect_normal = tx_select;
            }
        }

        let mut best_cost_txskip = COST_MAX;
        if cu.can_transform_skip(comp) && !restrictions.disable_transform_skip {
            cu.set_transform_from_select_idx(comp, -1);
            let dist_txskip = self.transform_and_reconstruct(cu, comp, qp, true);
            let cost = self.get_transform_cost(cu, comp, qp, dist_txskip);
            if cost < best_cost_txskip {
                best_cost_txskip = cost;
            }
        }

        let bias_tskip = best_cost_txskip == best_cost_normal
            && self.settings.bias_transform_select_cost
            && best_txselect_normal >= 0;
        if best_cost_txskip < best_cost_normal || bias_tskip {
            cu.set_transform_from_select_idx(comp, -1);
            self.transform_and_reconstruct(cu, comp, qp, true)
        } else {
            cu.set_transform_from_select_idx(comp, best_txselect_normal);
            self.transform_and_reconstruct(cu, comp, qp, false)
        }
    }

    fn get_transform_cost(&self, cu: &CodingUnit, comp: YuvComponent, qp: &Qp,
                          dist: Distortion) -> Cost {
        if dist == DIST_MAX {
            return COST_MAX;
        }
        let dist = if self.settings.fast_inter_transform_dist && cu.is_inter() && cu.get_cbf(comp)
        {
            self.get_residual_dist(cu, comp)
        } else {
            dist
        };
        let mut rdo_writer = RdoSyntaxWriter::new(0, 0);
        if cu.is_intra() && comp.is_luma() {
            xvce_eco_unit(cu, comp, &self.pic_data, &mut rdo_writer);
        } else {
            xvce_eco_residual_rdo_cbf(cu, comp, &mut rdo_writer);
        }
        xvce_lambda_cost(dist, rdo_writer.get_num_written_bits(), qp.get_lambda())
    }

    /* transform, quantize, reconstruct; DIST_MAX flags a configuration that
     * must not be signaled */
    pub(crate) fn transform_and_reconstruct(&mut self, cu: &mut CodingUnit, comp: YuvComponent,
                                            qp: &Qp, skip_transform: bool) -> Distortion {
        let restrictions = Restrictions::get();
        let c = comp.idx();
        let cu_x = cu.get_pos_x(comp);
        let cu_y = cu.get_pos_y(comp);
        let width = cu.get_width(comp);
        let height = cu.get_height(comp);
        let len = width * height;

        /* residual */
        for j in 0..height {
            let orig_row = &self.orig_pic.planes[c].row(cu_y + j)[cu_x..cu_x + width];
            for i in 0..width {
                self.temp_resi_orig[j * width + i] =
                    orig_row[i] as i32 - self.tx_pred[c][j * width + i] as i32;
            }
        }

        /* transform */
        let tx_select_idx = if comp.is_luma() { cu.get_transform_select_idx() } else { -1 };
        if !skip_transform {
            xvce_fwd_transform(&self.temp_resi_orig, &mut self.temp_coeff, width, height,
                               tx_select_idx);
        } else {
            xvce_fwd_transform_skip(&self.temp_resi_orig, &mut self.temp_coeff, len);
        }

        /* quant */
        let is_intra = cu.is_intra();
        let lambda = qp.get_lambda();
        let non_zero = xvce_quant(qp, comp, &self.temp_coeff, cu.get_coeff_mut(comp), len,
                                  is_intra, self.settings.rdo_quant, lambda);
        if comp.is_luma() && cu.get_transform_select_idx() > 0 && cu.is_intra()
            && non_zero < TRANSFORM_SELECT_MIN_SIG_COEFFS
        {
            /* transform select idx signaling invariant for intra */
            return DIST_MAX;
        }
        if comp.is_luma() && cu.has_transform_select_idx() && cu.is_inter() && non_zero == 0 {
            /* transform select idx signaling invariant for inter */
            return DIST_MAX;
        }
        if skip_transform && non_zero == 0 {
            /* prevent transform skip without coefficients */
            return DIST_MAX;
        }
        let mut cbf = non_zero != 0;
        if !cbf && restrictions.disable_transform_cbf {
            for v in cu.get_coeff_mut(comp).iter_mut() {
                *v = 0;
            }
            cbf = true;
        }
        cu.set_cbf(comp, cbf);
        cu.set_transform_skip(comp, skip_transform);

        if cbf {
            xvc_dequant(qp, comp, cu.get_coeff(comp), &mut self.temp_coeff);
            xvc_inv_transform(&self.temp_coeff, &mut self.temp_resi, width, height,
                              tx_select_idx, skip_transform);
            let max_pel = self.max_pel;
            for j in 0..height {
                let rec_row = &mut self.rec_pic.planes[c].row_mut(cu_y + j)[cu_x..cu_x + width];
                for i in 0..width {
                    rec_row[i] = XVC_CLIP3(
                        0,
                        max_pel as i32,
                        self.tx_pred[c][j * width + i] as i32 + self.temp_resi[j * width + i],
                    ) as pel;
                }
            }
        } else {
            self.rec_pic.write_block(c, cu_x, cu_y, width, height, &self.tx_pred[c][..len]);
        }

        xvce_ssd_planes(&self.orig_pic.planes[c], &self.rec_pic.planes[c], cu_x, cu_y, width,
                        height)
    }

    /* cheap residual-domain distortion used only for rd comparisons */
    pub(crate) fn get_residual_dist(&self, cu: &CodingUnit, comp: YuvComponent) -> Distortion {
        let len = cu.get_width(comp) * cu.get_height(comp);
        xvce_ssd_short(&self.temp_resi_orig, &self.temp_resi, len)
    }

    /* compare the chosen residual against dropping it entirely */
    pub(crate) fn eval_cbf_zero(&mut self, cu: &mut CodingUnit, qp: &Qp, comp: YuvComponent,
                                dist_non_zero: Distortion, dist_zero: Distortion) -> bool {
        if Restrictions::get().disable_transform_cbf {
            /* a cleared cbf has no signaling under this restriction */
            return false;
        }
        let mut non_zero_writer = RdoSyntaxWriter::new(0, 0);
        xvce_eco_residual_rdo_cbf(cu, comp, &mut non_zero_writer);
        let non_zero_bits = non_zero_writer.get_num_written_bits();

        let mut zero_writer = RdoSyntaxWriter::new(0, 0);
        xvce_eco_cbf(false, &mut zero_writer);
        let bits_zero = zero_writer.get_num_written_bits();

        let cost_non_zero = xvce_lambda_cost(dist_non_zero, non_zero_bits, qp.get_lambda());
        let cost_zero = xvce_lambda_cost(dist_zero, bits_zero, qp.get_lambda());
        let bias_cbf_zero = cost_zero == cost_non_zero
            && self.settings.bias_transform_select_cost
            && ((cu.has_transform_select_idx() && comp.is_luma()) || cu.get_transform_skip(comp));
        if cost_zero < cost_non_zero || bias_cbf_zero {
            cu.clear_cbf(comp);
            return true;
        }
        false
    }

    /* same comparison over the whole component set of an inter cu */
    pub(crate) fn eval_root_cbf_zero(&mut self, cu: &CodingUnit, qp: &Qp,
                                     sum_dist_non_zero: Distortion, sum_dist_zero: Distortion)
                                     -> bool {
        let mut writer_nonzero = RdoSyntaxWriter::new(0, 0);
        for &comp in self.pic_data.get_components(cu.get_cu_tree()) {
            xvce_eco_residual_rdo_cbf(cu, comp, &mut writer_nonzero);
        }
        let bits_non_zero = writer_nonzero.get_num_written_bits();

        let bits_zero;
        if self.settings.fast_inter_root_cbf_zero_bits {
            xvce_eco_root_cbf(false, &mut writer_nonzero);
            bits_zero = writer_nonzero.get_num_written_bits() - bits_non_zero;
        } else {
            let mut writer_zero = RdoSyntaxWriter::new(0, 0);
            xvce_eco_root_cbf(false, &mut writer_zero);
            bits_zero = writer_zero.get_num_written_bits();
        }

        let cost_zero = xvce_lambda_cost(sum_dist_zero, bits_zero, qp.get_lambda());
        let cost_non_zero = xvce_lambda_cost(sum_dist_non_zero, bits_non_zero, qp.get_lambda());
        cost_zero < cost_non_zero
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{EncoderConfig, EncoderSettings};
    use crate::frame::Frame;

    fn test_ctx() -> XvceCtx {
        let cfg = EncoderConfig {
            width: 64,
            height: 64,
            qp: 32,
            ..Default::default()
        };
        let mut ctx = XvceCtx::new(&cfg, &EncoderSettings::default()).unwrap();
        ctx.orig_pic = Frame::new(64, 64, ChromaFormat::CF_420, 8);
        ctx.rec_pic = Frame::new(64, 64, ChromaFormat::CF_420, 8);
        ctx
    }

    fn leaf_cu(pred_mode: PredMode) -> CodingUnit {
        let mut cu = CodingUnit::default();
        cu.init(CuTree::Primary, 3, 0, 0, 0, 4, 4, 1);
        cu.set_pred_mode(pred_mode);
        cu
    }

    #[test]
    fn intra_transform_select_requires_three_significant_coefficients() {
        let mut ctx = test_ctx();
        /* constant residual quantizes to a lone dc coefficient */
        for y in 0..4 {
            for x in 0..4 {
                ctx.orig_pic.planes[Y_C].data[y * 64 + x] = 64;
            }
        }
        let mut cu = leaf_cu(PredMode::Intra);
        cu.set_transform_from_select_idx(YuvComponent::Y, 1);
        let qp = Qp::new(32);
        let dist = ctx.transform_and_reconstruct(&mut cu, YuvComponent::Y, &qp, false);
        assert_eq!(dist, DIST_MAX);
    }

    #[test]
    fn inter_transform_select_requires_a_coefficient() {
        let mut ctx = test_ctx();
        let mut cu = leaf_cu(PredMode::Inter);
        cu.set_transform_from_select_idx(YuvComponent::Y, 0);
        let qp = Qp::new(32);
        /* zero residual, nothing survives quantization */
        let dist = ctx.transform_and_reconstruct(&mut cu, YuvComponent::Y, &qp, false);
        assert_eq!(dist, DIST_MAX);
    }

    #[test]
    fn transform_skip_without_coefficients_is_rejected() {
        let mut ctx = test_ctx();
        let mut cu = leaf_cu(PredMode::Intra);
        cu.set_transform_from_select_idx(YuvComponent::Y, -1);
        let qp = Qp::new(32);
        let dist = ctx.transform_and_reconstruct(&mut cu, YuvComponent::Y, &qp, true);
        assert_eq!(dist, DIST_MAX);
    }

    #[test]
    fn zero_residual_with_plain_transform_clears_cbf() {
        let mut ctx = test_ctx();
        let mut cu = leaf_cu(PredMode::Intra);
        cu.set_transform_from_select_idx(YuvComponent::Y, -1);
        let qp = Qp::new(32);
        let dist = ctx.transform_and_reconstruct(&mut cu, YuvComponent::Y, &qp, false);
        assert_eq!(dist, 0);
        assert!(!cu.get_cbf(YuvComponent::Y));
    }

    #[test]
    fn select_engine_rejects_invalid_candidates_and_still_reconstructs() {
        let mut ctx = test_ctx();
        for y in 0..4 {
            for x in 0..4 {
                ctx.orig_pic.planes[Y_C].data[y * 64 + x] = 64;
            }
        }
        let mut cu = leaf_cu(PredMode::Intra);
        let qp = Qp::new(32);
        let dist = ctx.compress_and_eval_transform(&mut cu, YuvComponent::Y, &qp);
        assert_ne!(dist, DIST_MAX);
        /* a lone dc coefficient cannot carry a positive select idx */
        assert!(cu.get_transform_select_idx() <= 0);
    }
}
