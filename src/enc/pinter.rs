use crate::cu::CodingUnit;
use crate::def::*;
use crate::enc::sad::*;
use crate::enc::*;
use crate::mc::*;
use crate::picman::MergeCand;
use crate::qp::Qp;

/*****************************************************************************
 * inter prediction analysis
 *****************************************************************************/

/* bits of a signed exp-golomb code, for motion cost estimates */
#[inline]
fn xvce_se_bits(val: i32) -> u32 {
    let u = if val > 0 { (val * 2 - 1) as u32 } else { (-val * 2) as u32 };
    2 * (32 - (u + 1).leading_zeros()) - 1
}

impl XvceCtx {
    pub(crate) fn tree_components(&self, cu: &CodingUnit) -> ([YuvComponent; 3], usize) {
        let list = self.pic_data.get_components(cu.get_cu_tree());
        let mut comps = [YuvComponent::Y; 3];
        comps[..list.len()].copy_from_slice(list);
        (comps, list.len())
    }

    /* prediction samples for every component of the cu, from its current
     * motion parameters */
    pub(crate) fn predict_inter_cu(&mut self, cu: &CodingUnit) {
        let refi = cu.pred.refi[REFP_0].max(0) as usize;
        let refp = self.refs[refi].clone();
        let (comps, n) = self.tree_components(cu);
        for &comp in comps[..n].iter() {
            let c = comp.idx();
            let x = cu.get_pos_x(comp);
            let y = cu.get_pos_y(comp);
            let w = cu.get_width(comp);
            let h = cu.get_height(comp);
            if cu.pred.affine {
                let (v0, v1) = (cu.pred.mv[0], cu.pred.mv[1]);
                if comp.is_luma() {
                    xvc_mc_affine_luma(&refp.planes[c], x, y, v0, v1, w, h,
                                       &mut self.tx_pred[c]);
                } else {
                    xvc_mc_affine_chroma(&refp.planes[c], x, y, v0, v1, w, h,
                                         &mut self.tx_pred[c]);
                }
            } else {
                let mv = cu.pred.mv[REFP_0];
                if comp.is_luma() {
                    xvc_mc_luma(&refp.planes[c], x, y, mv, w, h, &mut self.tx_pred[c]);
                } else {
                    xvc_mc_chroma(&refp.planes[c], x, y, mv, w, h, &mut self.tx_pred[c]);
                }
            }
            if cu.pred.lic {
                let frac_log2 = if comp.is_luma() { 2 } else { 3 };
                let offset = xvc_lic_offset(&self.rec_pic.planes[c], &refp.planes[c], x, y,
                                            cu.pred.mv[REFP_0], frac_log2, w, h);
                xvc_apply_lic(&mut self.tx_pred[c][..w * h], offset, self.max_pel);
            }
        }
    }

    /* transform every component of an inter cu, then weigh per-component
     * cbf-zero and root-cbf-zero */
    pub(crate) fn compress_inter_residual(&mut self, cu: &mut CodingUnit, qp: &Qp,
                                          force_skip: bool) -> Distortion {
        let (comps, n) = self.tree_components(cu);
        let comps = &comps[..n];

        if force_skip {
            let mut dist = 0;
            for &comp in comps {
                let c = comp.idx();
                let x = cu.get_pos_x(comp);
                let y = cu.get_pos_y(comp);
                let w = cu.get_width(comp);
                let h = cu.get_height(comp);
                cu.set_cbf(comp, false);
                cu.set_transform_skip(comp, false);
                cu.set_transform_from_select_idx(comp, -1);
                self.rec_pic.write_block(c, x, y, w, h, &self.tx_pred[c][..w * h]);
                dist += xvce_ssd(&self.orig_pic.planes[c], x, y, &self.tx_pred[c][..w * h], w, h);
            }
            cu.set_root_cbf(false);
            return dist;
        }

        let mut dist_total = 0;
        let mut dist_zero_total = 0;
        for &comp in comps {
            let c = comp.idx();
            let x = cu.get_pos_x(comp);
            let y = cu.get_pos_y(comp);
            let w = cu.get_width(comp);
            let h = cu.get_height(comp);
            let dist_zero = xvce_ssd(&self.orig_pic.planes[c], x, y, &self.tx_pred[c][..w * h],
                                     w, h);
            let mut dist = self.compress_and_eval_transform(cu, comp, qp);
            if cu.get_cbf(comp) && self.eval_cbf_zero(cu, qp, comp, dist, dist_zero) {
                self.rec_pic.write_block(c, x, y, w, h, &self.tx_pred[c][..w * h]);
                dist = dist_zero;
            }
            dist_total += dist;
            dist_zero_total += dist_zero;
        }

        if cu.get_has_any_cbf()
            && self.eval_root_cbf_zero(cu, qp, dist_total, dist_zero_total)
        {
            for &comp in comps {
                let c = comp.idx();
                let x = cu.get_pos_x(comp);
                let y = cu.get_pos_y(comp);
                let w = cu.get_width(comp);
                let h = cu.get_height(comp);
                cu.clear_cbf(comp);
                self.rec_pic.write_block(c, x, y, w, h, &self.tx_pred[c][..w * h]);
            }
            cu.set_root_cbf(false);
            return dist_zero_total;
        }
        cu.set_root_cbf(cu.get_has_any_cbf());
        dist_total
    }

    /* full-pel diamond search from the best of {mvp, zero}, with optional
     * sub-pel refinement */
    pub(crate) fn motion_estimate(&mut self, cu: &CodingUnit, qp: &Qp, fullpel_only: bool) -> Mv {
        let x = cu.get_pos_x(YuvComponent::Y);
        let y = cu.get_pos_y(YuvComponent::Y);
        let w = cu.get_width(YuvComponent::Y);
        let h = cu.get_height(YuvComponent::Y);
        let refi = cu.pred.refi[REFP_0].max(0) as usize;
        let refp = self.refs[refi].clone();
        let mvp = self.pic_data.get_merge_candidates(cu)[0].mv;
        let lambda_sqrt = qp.get_lambda_sqrt();

        let mut scratch = vec![0 as pel; w * h];
        let mv_cost = |mv: Mv, scratch: &mut [pel]| -> u64 {
            xvc_mc_luma(&refp.planes[Y_C], x, y, mv, w, h, scratch);
            let sad = xvce_sad(&self.orig_pic.planes[Y_C], x, y, scratch, w, h);
            let mvd = if fullpel_only {
                let base = mvp.round_to_fullpel();
                Mv::new((mv.x - base.x) >> 2, (mv.y - base.y) >> 2)
            } else {
                Mv::new(mv.x - mvp.x, mv.y - mvp.y)
            };
            let bits = xvce_se_bits(mvd.x as i32) + xvce_se_bits(mvd.y as i32);
            sad + (bits as f64 * lambda_sqrt + 0.5) as u64
        };

        let mut best_mv = mvp.round_to_fullpel();
        let mut best_cost = mv_cost(best_mv, &mut scratch);
        let zero_cost = mv_cost(Mv::ZERO, &mut scratch);
        if zero_cost < best_cost {
            best_cost = zero_cost;
            best_mv = Mv::ZERO;
        }

        let mut step: i16 = 8 * 4; /* full-pel units in quarter-pel scale */
        while step >= 4 {
            let mut improved = false;
            for &(dx, dy) in [(step, 0), (-step, 0), (0, step), (0, -step)].iter() {
                let mv = Mv::new(best_mv.x.saturating_add(dx), best_mv.y.saturating_add(dy));
                let cost = mv_cost(mv, &mut scratch);
                if cost < best_cost {
                    best_cost = cost;
                    best_mv = mv;
                    improved = true;
                }
            }
            if !improved {
                step >>= 1;
            }
        }

        if !fullpel_only {
            for &step in [2i16, 1].iter() {
                let center = best_mv;
                for &(dx, dy) in [
                    (-step, -step), (0, -step), (step, -step), (-step, 0),
                    (step, 0), (-step, step), (0, step), (step, step),
                ].iter() {
                    let mv = Mv::new(center.x + dx, center.y + dy);
                    let cost = mv_cost(mv, &mut scratch);
                    if cost < best_cost {
                        best_cost = cost;
                        best_mv = mv;
                    }
                }
            }
        }
        best_mv
    }

    /* regular motion search modes (me / lic / fullpel / lic+fullpel) */
    pub(crate) fn compress_inter_search(&mut self, cu: &mut CodingUnit, qp: &Qp, fullpel: bool,
                                        lic: bool) -> Distortion {
        cu.reset_prediction_state();
        cu.set_pred_mode(PredMode::Inter);
        cu.set_skip_flag(false);
        cu.set_merge_flag(false);
        cu.pred.refi[REFP_0] = 0;
        cu.pred.fullpel_mv = fullpel;
        cu.pred.lic = lic;
        let mv = self.motion_estimate(cu, qp, fullpel);
        let mvp = self.pic_data.get_merge_candidates(cu)[0].mv;
        cu.pred.mv[REFP_0] = mv;
        cu.pred.mvd[REFP_0] = if fullpel {
            let base = mvp.round_to_fullpel();
            Mv::new((mv.x - base.x) >> 2, (mv.y - base.y) >> 2)
        } else {
            Mv::new(mv.x - mvp.x, mv.y - mvp.y)
        };
        self.predict_inter_cu(cu);
        self.compress_inter_residual(cu, qp, false)
    }

    /* one merge candidate, optionally with the residual forced to zero */
    pub(crate) fn compress_merge_cand(&mut self, cu: &mut CodingUnit, qp: &Qp,
                                      merge_list: &[MergeCand; NUM_INTER_MERGE_CANDIDATES],
                                      merge_idx: usize, force_skip: bool) -> Distortion {
        let cand = merge_list[merge_idx];
        cu.pred.affine = false;
        cu.set_merge_idx(merge_idx as i8);
        cu.pred.mv[REFP_0] = cand.mv;
        cu.pred.refi[REFP_0] = cand.refi;
        cu.pred.mvd[REFP_0] = Mv::ZERO;
        cu.pred.fullpel_mv = false;
        cu.pred.lic = false;
        self.predict_inter_cu(cu);
        self.compress_inter_residual(cu, qp, force_skip)
    }

    /* prediction-only satd screen that reorders the candidate list */
    pub(crate) fn search_merge_candidates(&mut self, cu: &CodingUnit,
                                          merge_list: &[MergeCand; NUM_INTER_MERGE_CANDIDATES],
                                          cand_lookup: &mut [usize; NUM_INTER_MERGE_CANDIDATES])
                                          -> usize {
        let x = cu.get_pos_x(YuvComponent::Y);
        let y = cu.get_pos_y(YuvComponent::Y);
        let w = cu.get_width(YuvComponent::Y);
        let h = cu.get_height(YuvComponent::Y);
        let refp = self.refs[0].clone();
        let mut scratch = vec![0 as pel; w * h];
        let mut scored: [(u64, usize); NUM_INTER_MERGE_CANDIDATES] =
            [(0, 0); NUM_INTER_MERGE_CANDIDATES];
        for (idx, cand) in merge_list.iter().enumerate() {
            xvc_mc_luma(&refp.planes[Y_C], x, y, cand.mv, w, h, &mut scratch);
            scored[idx] = (xvce_satd(&self.orig_pic.planes[Y_C], x, y, &scratch, w, h), idx);
        }
        scored.sort_by_key(|&(satd, _)| satd);
        for (i, &(_, idx)) in scored.iter().enumerate() {
            cand_lookup[i] = idx;
        }
        NUM_INTER_MERGE_CANDIDATES
    }

    pub(crate) fn compress_affine_merge_cand(&mut self, cu: &mut CodingUnit, qp: &Qp,
                                             force_skip: bool) -> Distortion {
        let (v0, v1) = self.pic_data.get_affine_merge_cand(cu);
        cu.pred.mv[0] = v0;
        cu.pred.mv[1] = v1;
        cu.pred.refi[REFP_0] = 0;
        cu.pred.mvd[REFP_0] = Mv::ZERO;
        cu.pred.fullpel_mv = false;
        cu.pred.lic = false;
        self.predict_inter_cu(cu);
        self.compress_inter_residual(cu, qp, force_skip)
    }
}
