use crate::cu::{CodingUnit, ReconstructionState};
use crate::def::*;
use crate::enc::bsw::XvceBsw;
use crate::enc::eco::*;
use crate::enc::*;
use crate::qp::Qp;
use crate::restrictions::Restrictions;
use crate::util::*;

/* rd modes of the inter leaf menu */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RdMode {
    InterMe,
    InterFullpel,
    InterLic,
    InterLicFullpel,
}

/*****************************************************************************
 * ctu rdo search
 *****************************************************************************/

impl XvceCtx {
    pub(crate) fn encode_ctu(&mut self, rsaddr: usize, bitstream_writer: &mut XvceBsw) {
        let frac_bits = if self.settings.count_actual_written_bits {
            bitstream_writer.get_fractional_bits()
        } else if rsaddr == 0 {
            0
        } else {
            self.last_ctu_frac_bits
        };
        let mut rdo_writer = RdoSyntaxWriter::new(0, frac_bits);

        let mut ctu_qp = self.pic_data.get_pic_qp().get_qp_raw(YuvComponent::Y);
        if self.pic_data.get_adaptive_qp() != 0 {
            let ctu = self.pic_data.get_ctu(CuTree::Primary, rsaddr).unwrap();
            let x = ctu.get_pos_x(YuvComponent::Y);
            let y = ctu.get_pos_y(YuvComponent::Y);
            let w = ctu.get_width(YuvComponent::Y);
            let h = ctu.get_height(YuvComponent::Y);
            ctu_qp += self.calc_delta_qp_from_variance(x, y, w, h);
        }
        let qp = Qp::new(ctu_qp);

        let mut ctu = self.pic_data.take_ctu(CuTree::Primary, rsaddr).unwrap();
        ctu.set_qp(qp);
        self.compress_cu(&mut ctu, 0, SplitRestriction::None, &mut rdo_writer, qp);
        self.pic_data.set_ctu(CuTree::Primary, rsaddr, ctu);
        if self.pic_data.has_secondary_cu_tree() {
            let mut ctu2 = self.pic_data.take_ctu(CuTree::Secondary, rsaddr).unwrap();
            ctu2.set_qp(qp);
            if self.settings.strict_rdo_bit_counting {
                self.compress_cu(&mut ctu2, 0, SplitRestriction::None, &mut rdo_writer, qp);
            } else {
                let mut rdo_writer2 = RdoSyntaxWriter::new(0, 0);
                self.compress_cu(&mut ctu2, 0, SplitRestriction::None, &mut rdo_writer2, qp);
            }
            self.pic_data.set_ctu(CuTree::Secondary, rsaddr, ctu2);
        }
        self.last_ctu_frac_bits = rdo_writer.get_fractional_bits();

        self.write_ctu(rsaddr, bitstream_writer);
        if self.settings.strict_rdo_bit_counting
            && self.settings.count_actual_written_bits
            && self.pic_data.get_adaptive_qp() == 0
            && !Restrictions::get().disable_ext_implicit_last_ctu
        {
            debug_assert_eq!(rdo_writer.get_num_written_bits(),
                             bitstream_writer.get_num_written_bits());
        }
    }

    pub(crate) fn compress_cu(&mut self, best_cu: &mut Box<CodingUnit>, rdo_depth: usize,
                              split_restriction: SplitRestriction, writer: &mut RdoSyntaxWriter,
                              qp: Qp) -> Distortion {
        best_cu.set_qp(qp);
        let elig = self.pic_data.split_eligibility(best_cu, split_restriction);
        let do_split_any = elig.quad || elig.hor || elig.ver;
        debug_assert!(elig.full || do_split_any);
        if !do_split_any {
            return self.compress_no_split(best_cu, rdo_depth, split_restriction, writer);
        }

        let tree_idx = best_cu.get_cu_tree() as usize;
        let mut temp_cu = self.rdo_temp_cu[tree_idx][rdo_depth].take().unwrap();
        let mut best_state = std::mem::take(&mut self.temp_cu_state[rdo_depth]);
        let dist = self.compress_cu_inner(best_cu, &mut temp_cu, &mut best_state, rdo_depth,
                                          split_restriction, writer, qp);
        self.rdo_temp_cu[tree_idx][rdo_depth] = Some(temp_cu);
        self.temp_cu_state[rdo_depth] = best_state;
        dist
    }

    #[allow(clippy::too_many_arguments)]
    fn compress_cu_inner(&mut self, best_cu: &mut Box<CodingUnit>, temp_cu: &mut Box<CodingUnit>,
                         best_state: &mut ReconstructionState, rdo_depth: usize,
                         split_restriction: SplitRestriction, writer: &mut RdoSyntaxWriter,
                         qp: Qp) -> Distortion {
        let elig = self.pic_data.split_eligibility(best_cu, split_restriction);
        let (comps, n) = self.tree_components(best_cu);
        let comps = comps[..n].to_vec();
        let comps = comps.as_slice();

        temp_cu.copy_position_and_size_from(best_cu);
        if best_cu.get_binary_depth() == 0 {
            /* first cu in a quad split, clear up cache */
            self.cache.invalidate(best_cu.get_cu_tree(), best_cu.get_depth());
        }

        let mut best_cost = RdoCost::max();
        let mut best_writer = *writer;

        /* first eval without cu split */
        if elig.full {
            let start_bits = writer.get_num_written_bits();
            let mut full_writer = *writer;
            let dist = self.compress_no_split(best_cu, rdo_depth, split_restriction,
                                              &mut full_writer);
            let full_bits = full_writer.get_num_written_bits() - start_bits;
            best_cost = RdoCost::new(xvce_lambda_cost(dist, full_bits, qp.get_lambda()), dist);
            best_writer = full_writer;
            best_cu.save_state_to(best_state, &self.rec_pic, comps);
        }

        /* skip split eval speed-up */
        if self.settings.fast_cu_split_based_on_full_cu && elig.full
            && self.can_skip_any_split_for_cu(best_cu)
        {
            *writer = best_writer;
            return best_cost.dist;
        }

        let mut best_binary_depth_greater_than_one = false;
        let mut hor_cost: Cost = 0;

        /* horizontal split */
        if elig.hor {
            let mut splitcu_writer = *writer;
            let split_cost = self.compress_split_cu(temp_cu, rdo_depth, qp,
                                                    SplitType::Horizontal, split_restriction,
                                                    &mut splitcu_writer);
            hor_cost = split_cost.cost;
            for sub in temp_cu.sub_cu.iter() {
                if let Some(sub) = sub.as_deref() {
                    best_binary_depth_greater_than_one |= sub.get_split() != SplitType::None;
                }
            }
            if split_cost.cost < best_cost.cost {
                std::mem::swap(best_cu, temp_cu);
                if !elig.quad && !elig.ver {
                    /* no more split evaluations */
                    *writer = splitcu_writer;
                    return split_cost.dist;
                }
                best_cost = split_cost;
                best_writer = splitcu_writer;
                best_cu.save_state_to(best_state, &self.rec_pic, comps);
            } else {
                /* restore (previous) best state */
                best_cu.load_state_from(best_state, &mut self.rec_pic, comps);
                self.pic_data.mark_used_in_pic(best_cu);
            }
        }

        /* vertical split */
        if elig.ver {
            let mut splitcu_writer = *writer;
            let split_cost = self.compress_split_cu(temp_cu, rdo_depth, qp, SplitType::Vertical,
                                                    split_restriction, &mut splitcu_writer);
            if split_cost.cost < hor_cost {
                best_binary_depth_greater_than_one = false;
                for sub in temp_cu.sub_cu.iter() {
                    if let Some(sub) = sub.as_deref() {
                        best_binary_depth_greater_than_one |= sub.get_split() != SplitType::None;
                    }
                }
            }
            if split_cost.cost < best_cost.cost {
                std::mem::swap(best_cu, temp_cu);
                if !elig.quad {
                    /* no more split evaluations */
                    *writer = splitcu_writer;
                    return split_cost.dist;
                }
                best_cost = split_cost;
                best_writer = splitcu_writer;
                best_cu.save_state_to(best_state, &self.rec_pic, comps);
            } else {
                best_cu.load_state_from(best_state, &mut self.rec_pic, comps);
                self.pic_data.mark_used_in_pic(best_cu);
            }
        }

        /* quad split speed-up */
        if self.settings.fast_quad_split_based_on_binary_split != 0 && elig.quad && elig.hor
            && elig.ver
            && self.can_skip_quad_split_for_cu(best_cu, best_binary_depth_greater_than_one)
        {
            *writer = best_writer;
            return best_cost.dist;
        }

        /* quad split */
        if elig.quad {
            let mut splitcu_writer = *writer;
            let split_cost = self.compress_split_cu(temp_cu, rdo_depth, qp, SplitType::Quad,
                                                    split_restriction, &mut splitcu_writer);
            if split_cost.cost < best_cost.cost {
                std::mem::swap(best_cu, temp_cu);
                /* no more split evaluations */
                *writer = splitcu_writer;
                return split_cost.dist;
            } else {
                best_cu.load_state_from(best_state, &mut self.rec_pic, comps);
                self.pic_data.mark_used_in_pic(best_cu);
            }
        }

        *writer = best_writer;
        best_cost.dist
    }

    fn compress_split_cu(&mut self, cu: &mut Box<CodingUnit>, rdo_depth: usize, qp: Qp,
                         split_type: SplitType, split_restriction: SplitRestriction,
                         rdo_writer: &mut RdoSyntaxWriter) -> RdoCost {
        if cu.get_split() != SplitType::None {
            self.pic_data.unsplit_cu(cu);
        }
        self.pic_data.split_cu(cu, split_type);
        self.pic_data.clear_mark_cu_in_pic(cu);
        let mut dist: Distortion = 0;
        let start_bits = rdo_writer.get_num_written_bits();
        let mut sub_split_restriction = SplitRestriction::None;
        if self.settings.strict_rdo_bit_counting {
            xvce_eco_split(cu, &self.pic_data, split_restriction, rdo_writer);
        }
        for i in 0..4 {
            if let Some(mut sub_cu) = cu.sub_cu[i].take() {
                dist += self.compress_cu(&mut sub_cu, rdo_depth + 1, sub_split_restriction,
                                         rdo_writer, qp);
                sub_split_restriction = sub_cu.derive_sibling_split_restriction(split_type);
                cu.sub_cu[i] = Some(sub_cu);
            }
        }
        if !self.settings.strict_rdo_bit_counting {
            xvce_eco_split(cu, &self.pic_data, split_restriction, rdo_writer);
        }
        let bits = rdo_writer.get_num_written_bits() - start_bits;
        RdoCost::new(xvce_lambda_cost(dist, bits, qp.get_lambda()), dist)
    }

    fn compress_no_split(&mut self, best_cu: &mut Box<CodingUnit>, rdo_depth: usize,
                         split_restriction: SplitRestriction, writer: &mut RdoSyntaxWriter)
                         -> Distortion {
        let qp = best_cu.get_qp();
        if best_cu.get_split() != SplitType::None {
            self.pic_data.unsplit_cu(best_cu);
        }
        best_cu.set_qp(qp);

        let tree_idx = best_cu.get_cu_tree() as usize;
        let cache_result = self.cache.lookup(best_cu);

        let best_cost;
        if self.settings.skip_mode_decision_for_identical_cu
            && cache_result.cu.is_some()
            && best_cu.get_depth() > 0
            && best_cu.is_first_cu_in_quad(best_cu.get_depth() - 1)
        {
            /* use cached cu */
            best_cu.copy_prediction_data_from(cache_result.cu.as_ref().unwrap());
            let dist = self.compress_fast(best_cu, qp);
            best_cost = RdoCost::new(0, dist);
        } else if self.pic_data.is_intra_pic() {
            best_cost = self.compress_intra_cost(best_cu, qp);
        } else {
            let mut temp_cu = self.rdo_temp_cu[tree_idx][rdo_depth + 1].take().unwrap();
            let cost = self.compress_inter_pic(best_cu, &mut temp_cu, qp, rdo_depth,
                                               &cache_result);
            self.rdo_temp_cu[tree_idx][rdo_depth + 1] = Some(temp_cu);
            best_cost = cost;
        }
        self.pic_data.mark_used_in_pic(best_cu);

        if cache_result.cacheable {
            /* save prediction data in cache */
            self.cache.store(best_cu);
        }

        if self.settings.strict_rdo_bit_counting {
            xvce_eco_split(best_cu, &self.pic_data, split_restriction, writer);
        }
        let (comps, n) = self.tree_components(best_cu);
        for &comp in comps[..n].iter() {
            xvce_eco_unit(best_cu, comp, &self.pic_data, writer);
        }
        if !self.settings.strict_rdo_bit_counting {
            xvce_eco_split(best_cu, &self.pic_data, split_restriction, writer);
        }
        best_cost.dist
    }

    /* re-run transform and reconstruction for a cu whose prediction
     * decisions came from the cache; no mode search */
    fn compress_fast(&mut self, cu: &mut CodingUnit, qp: Qp) -> Distortion {
        debug_assert!(cu.get_split() == SplitType::None);
        if cu.is_intra() {
            let (comps, n) = self.tree_components(cu);
            let mut dist = 0;
            for i in 0..n {
                dist += self.compress_intra_comp_fixed_dir(cu, comps[i], &qp);
            }
            dist
        } else {
            self.predict_inter_cu(cu);
            let force_skip = cu.get_skip_flag();
            self.compress_inter_residual(cu, &qp, force_skip)
        }
    }

    fn compress_inter_pic(&mut self, best_cu: &mut Box<CodingUnit>,
                          temp_cu: &mut Box<CodingUnit>, qp: Qp, rdo_depth: usize,
                          cache_result: &crate::enc::cache::CacheResult) -> RdoCost {
        let restrictions = Restrictions::get();
        let mut best_state = std::mem::take(&mut self.temp_cu_state[rdo_depth + 1]);
        let (comps, n) = self.tree_components(best_cu);
        let comps = comps[..n].to_vec();
        debug_assert!(best_cu.get_split() == SplitType::None);
        temp_cu.copy_position_and_size_from(best_cu);
        if temp_cu.get_split() != SplitType::None {
            self.pic_data.unsplit_cu(temp_cu);
        }

        let fast_skip_inter = self.settings.fast_mode_selection_for_cached_cu
            && (cache_result.any_intra || cache_result.any_skip)
            && !restrictions.disable_inter_merge_mode;
        let fast_skip_intra =
            self.settings.fast_mode_selection_for_cached_cu && cache_result.any_inter;

        let mut best_cost = RdoCost::max();

        macro_rules! save_if_best_cost {
            ($cost:expr) => {
                let cost: RdoCost = $cost;
                if cost.cost < best_cost.cost {
                    best_cost = cost;
                    temp_cu.save_state_to(&mut best_state, &self.rec_pic, &comps);
                    std::mem::swap(best_cu, temp_cu);
                }
            };
        }

        if temp_cu.can_affine_merge()
            && !restrictions.disable_ext2_inter_affine_merge
            && !restrictions.disable_inter_merge_mode
            && !restrictions.disable_ext2_inter_affine
        {
            save_if_best_cost!(self.compress_affine_merge(temp_cu, qp));
        }

        if !restrictions.disable_inter_merge_mode {
            let fast_merge_skip = self.settings.fast_merge_eval && cache_result.any_skip;
            save_if_best_cost!(self.compress_merge(temp_cu, qp, fast_merge_skip));
        }

        if !fast_skip_inter {
            save_if_best_cost!(self.compress_inter(temp_cu, qp, RdMode::InterMe));
        }

        if !fast_skip_inter && !restrictions.disable_ext2_inter_local_illumination_comp {
            save_if_best_cost!(self.compress_inter(temp_cu, qp, RdMode::InterLic));
        }

        if !restrictions.disable_ext2_inter_adaptive_fullpel_mv {
            save_if_best_cost!(self.compress_inter(temp_cu, qp, RdMode::InterFullpel));
        }

        if !restrictions.disable_ext2_inter_local_illumination_comp
            && !restrictions.disable_ext2_inter_adaptive_fullpel_mv
        {
            save_if_best_cost!(self.compress_inter(temp_cu, qp, RdMode::InterLicFullpel));
        }

        if (!fast_skip_intra && best_cu.get_has_any_cbf())
            || self.settings.always_evaluate_intra_in_inter
        {
            save_if_best_cost!(self.compress_intra_cost(temp_cu, qp));
        }

        debug_assert!(best_cost.cost < COST_MAX);
        best_cu.load_state_from(&best_state, &mut self.rec_pic, &comps);
        self.temp_cu_state[rdo_depth + 1] = best_state;
        best_cost
    }

    fn compress_intra_cost(&mut self, cu: &mut CodingUnit, qp: Qp) -> RdoCost {
        cu.reset_prediction_state();
        cu.set_pred_mode(PredMode::Intra);
        cu.set_skip_flag(false);
        let (comps, n) = self.tree_components(cu);
        let mut rdo_writer = RdoSyntaxWriter::new(0, 0);
        let mut dist = 0;
        if comps[0] == YuvComponent::Y {
            dist += self.compress_intra_luma(cu, &qp);
            xvce_eco_unit(cu, YuvComponent::Y, &self.pic_data, &mut rdo_writer);
            if n > 1 {
                dist += self.compress_intra_chroma(cu, &qp);
                xvce_eco_unit(cu, YuvComponent::U, &self.pic_data, &mut rdo_writer);
                xvce_eco_unit(cu, YuvComponent::V, &self.pic_data, &mut rdo_writer);
            }
        } else {
            dist += self.compress_intra_chroma_tree(cu, &qp);
            for &comp in comps[..n].iter() {
                xvce_eco_unit(cu, comp, &self.pic_data, &mut rdo_writer);
            }
        }
        let bits = rdo_writer.get_num_written_bits();
        RdoCost::new(xvce_lambda_cost(dist, bits, qp.get_lambda()), dist)
    }

    fn compress_inter(&mut self, cu: &mut CodingUnit, qp: Qp, rd_mode: RdMode) -> RdoCost {
        let (fullpel, lic) = match rd_mode {
            RdMode::InterMe => (false, false),
            RdMode::InterFullpel => (true, false),
            RdMode::InterLic => (false, true),
            RdMode::InterLicFullpel => (true, true),
        };
        let dist = self.compress_inter_search(cu, &qp, fullpel, lic);
        if dist == DIST_MAX {
            return RdoCost::new(COST_MAX, dist);
        }
        self.get_cu_cost_without_split(cu, qp, dist)
    }

    fn compress_merge(&mut self, cu: &mut CodingUnit, qp: Qp, fast_merge_skip: bool) -> RdoCost {
        let restrictions = Restrictions::get();
        let mut skip_evaluated = [false; NUM_INTER_MERGE_CANDIDATES];
        let num_merge_cand = if restrictions.disable_inter_merge_candidates {
            1
        } else {
            NUM_INTER_MERGE_CANDIDATES
        };
        cu.reset_prediction_state();
        cu.set_pred_mode(PredMode::Inter);
        cu.set_merge_flag(true);

        let merge_list = self.pic_data.get_merge_candidates(cu);
        let mut cand_lookup = [0usize; NUM_INTER_MERGE_CANDIDATES];
        let num_merge_cand = if self.settings.fast_merge_eval && !fast_merge_skip
            && num_merge_cand > 1
        {
            self.search_merge_candidates(cu, &merge_list, &mut cand_lookup)
        } else {
            for (i, slot) in cand_lookup.iter_mut().enumerate() {
                *slot = i;
            }
            num_merge_cand
        };

        let (comps, n) = self.tree_components(cu);
        let comps = comps[..n].to_vec();
        let mut best_transform_state = std::mem::take(&mut self.rd_transform_state);
        let mut best_cost = RdoCost::max();
        let mut best_merge_idx: i8 = -1;
        let skip_eval_init = if fast_merge_skip { 1 } else { 0 };
        'skip_eval: for skip_eval_idx in skip_eval_init..2 {
            let force_skip = skip_eval_idx != 0;
            for i in 0..num_merge_cand {
                let merge_idx = cand_lookup[i];
                if skip_evaluated[merge_idx] {
                    continue;
                }
                let dist = self.compress_merge_cand(cu, &qp, &merge_list, merge_idx, force_skip);
                let cost = self.get_cu_cost_without_split(cu, qp, dist);
                if !cu.get_has_any_cbf() {
                    skip_evaluated[merge_idx] = true;
                }
                if cost.cost < best_cost.cost {
                    best_cost = cost;
                    best_merge_idx = merge_idx as i8;
                    cu.save_residual_state_to(&mut best_transform_state, &self.rec_pic, &comps);
                    if !cu.get_has_any_cbf() && !force_skip {
                        /* encoder optimization, assume skip is always best */
                        break 'skip_eval;
                    }
                }
            }
        }
        debug_assert!(best_merge_idx >= 0);
        cu.set_merge_idx(best_merge_idx);
        let cand = merge_list[best_merge_idx as usize];
        cu.pred.mv[REFP_0] = cand.mv;
        cu.pred.refi[REFP_0] = cand.refi;
        cu.load_residual_state_from(&best_transform_state, &mut self.rec_pic, &comps);
        cu.set_skip_flag(!cu.get_has_any_cbf() && !restrictions.disable_inter_skip_mode);
        self.rd_transform_state = best_transform_state;
        best_cost
    }

    fn compress_affine_merge(&mut self, cu: &mut CodingUnit, qp: Qp) -> RdoCost {
        cu.reset_prediction_state();
        cu.set_pred_mode(PredMode::Inter);
        cu.set_merge_flag(true);
        cu.pred.affine = true;
        cu.set_merge_idx(0);

        let (comps, n) = self.tree_components(cu);
        let comps = comps[..n].to_vec();
        let mut best_transform_state = std::mem::take(&mut self.rd_transform_state);
        let dist = self.compress_affine_merge_cand(cu, &qp, false);
        let mut best_cost = self.get_cu_cost_without_split(cu, qp, dist);
        if cu.get_has_any_cbf() {
            cu.save_residual_state_to(&mut best_transform_state, &self.rec_pic, &comps);
            cu.set_skip_flag(true);
            let dist_skip = self.compress_affine_merge_cand(cu, &qp, true);
            let cost = self.get_cu_cost_without_split(cu, qp, dist_skip);
            if cost.cost < best_cost.cost {
                best_cost = cost;
            } else {
                cu.set_skip_flag(false);
                cu.load_residual_state_from(&best_transform_state, &mut self.rec_pic, &comps);
            }
        }
        self.rd_transform_state = best_transform_state;
        best_cost
    }

    pub(crate) fn get_cu_cost_without_split(&self, cu: &CodingUnit, qp: Qp, ssd: Distortion)
                                            -> RdoCost {
        let mut rdo_writer = RdoSyntaxWriter::new(0, 0);
        let (comps, n) = self.tree_components(cu);
        for &comp in comps[..n].iter() {
            xvce_eco_unit(cu, comp, &self.pic_data, &mut rdo_writer);
        }
        let bits = rdo_writer.get_num_written_bits();
        RdoCost::new(xvce_lambda_cost(ssd, bits, qp.get_lambda()), ssd)
    }

    /*************************************************************************
     * ctu write-out
     *************************************************************************/

    fn write_ctu(&mut self, rsaddr: usize, writer: &mut XvceBsw) -> bool {
        if self.settings.count_actual_written_bits {
            writer.reset_bit_counting();
        }
        let mut write_delta_qp = {
            let ctu = self.pic_data.get_ctu(CuTree::Primary, rsaddr).unwrap();
            xvce_eco_ctu(ctu, &self.pic_data, writer)
        };
        if self.pic_data.has_secondary_cu_tree() {
            let ctu2 = self.pic_data.get_ctu(CuTree::Secondary, rsaddr).unwrap();
            write_delta_qp |= xvce_eco_ctu(ctu2, &self.pic_data, writer);
        }

        let predicted_qp = self.prev_ctu_qp;
        if self.pic_data.get_adaptive_qp() > 0 {
            if write_delta_qp {
                let ctu_qp = self.pic_data.get_ctu(CuTree::Primary, rsaddr).unwrap().get_qp()
                    .get_qp_raw(YuvComponent::Y);
                xvce_eco_qp(ctu_qp, predicted_qp, writer);
                self.prev_ctu_qp = ctu_qp;
            } else {
                /* delta qp is not written if there was no cbf in the entire
                 * ctu; every cu falls back to the derived qp */
                let derived_qp = if self.pic_data.get_adaptive_qp() == 2 {
                    predicted_qp
                } else {
                    self.pic_data.get_pic_qp().get_qp_raw(YuvComponent::Y)
                };
                self.set_qp_for_all_cus_in_ctu(CuTree::Primary, rsaddr, derived_qp);
                if self.pic_data.has_secondary_cu_tree() {
                    self.set_qp_for_all_cus_in_ctu(CuTree::Secondary, rsaddr, derived_qp);
                }
                self.prev_ctu_qp = derived_qp;
            }
        }

        if Restrictions::get().disable_ext_implicit_last_ctu {
            xvce_eco_end_of_slice(false, writer);
        }
        write_delta_qp
    }

    fn set_qp_for_all_cus_in_ctu(&mut self, tree: CuTree, rsaddr: usize, qp_raw: i32) {
        let mut ctu = self.pic_data.take_ctu(tree, rsaddr).unwrap();
        fn set_qp_recursive(cu: &mut CodingUnit, qp: Qp) {
            cu.set_qp(qp);
            for sub in cu.sub_cu.iter_mut() {
                if let Some(sub) = sub.as_deref_mut() {
                    set_qp_recursive(sub, qp);
                }
            }
        }
        set_qp_recursive(&mut ctu, Qp::new(qp_raw));
        self.pic_data.mark_used_in_pic(&ctu);
        self.pic_data.set_ctu(tree, rsaddr, ctu);
    }

    /*************************************************************************
     * split pruning rules
     *************************************************************************/

    fn can_skip_any_split_for_cu(&self, cu: &CodingUnit) -> bool {
        let binary_depth_threshold = if self.pic_data.is_highest_layer() { 2 } else { 3 };
        cu.get_skip_flag() && cu.get_binary_depth() >= binary_depth_threshold
    }

    fn can_skip_quad_split_for_cu(&self, cu: &CodingUnit,
                                  binary_depth_greater_than_one: bool) -> bool {
        let comp = YuvComponent::Y;
        let tree = cu.get_cu_tree();
        let x = cu.get_pos_x(comp);
        let y = cu.get_pos_y(comp);
        if self.settings.fast_quad_split_based_on_binary_split == 1
            && binary_depth_greater_than_one
        {
            /* always evaluate quad split when binary split twice */
            return false;
        }
        let cu_top_left = match self.pic_data.get_cu_at(tree, x, y) {
            Some(info) => *info,
            None => return false,
        };
        let cu_bottom_right = match self.pic_data.get_cu_at(
            tree,
            x + cu.get_width(comp) - 1,
            y + cu.get_height(comp) - 1,
        ) {
            Some(info) => *info,
            None => return false,
        };
        let best_is_no_split = cu_top_left.binary_depth == 0;
        let best_is_single_bt_split =
            cu_top_left.binary_depth == 1 && cu_bottom_right.binary_depth == 1;
        match self.pic_data.get_max_binary_split_depth(tree) {
            1 | 2 => best_is_no_split && !self.pic_data.is_intra_pic(),
            3 => {
                best_is_no_split
                    || (best_is_single_bt_split && !self.pic_data.is_intra_pic())
            }
            4 => best_is_no_split || best_is_single_bt_split,
            _ => false,
        }
    }

    /*************************************************************************
     * adaptive qp
     *************************************************************************/

    pub(crate) fn calc_delta_qp_from_variance(&self, x: usize, y: usize, _w: usize, h: usize)
                                              -> i32 {
        const VAR_BLOCKSIZE: usize = 16;
        const MEAN_DIV: usize = 2;
        const MIN_QP_OFFSET: i32 = -3;
        const MAX_QP_OFFSET: i32 = 7;
        let strength = 1.0 * self.settings.aqp_strength as f64 / 10.0;
        let offset = 15.0;

        /* both grid dimensions derive from the height */
        let grid_h = h / VAR_BLOCKSIZE;
        let grid_w = h / VAR_BLOCKSIZE;
        let pic_w = self.pic_data.get_pic_width();
        let pic_h = self.pic_data.get_pic_height();
        let mut v = vec![std::u64::MAX; grid_h * grid_w];
        let mut blocks = 0;
        for i in 0..grid_h {
            if y + i * VAR_BLOCKSIZE >= pic_h {
                continue;
            }
            for j in 0..grid_w {
                if x + j * VAR_BLOCKSIZE >= pic_w {
                    continue;
                }
                v[blocks] = calc_variance(&self.orig_pic.planes[Y_C],
                                          x + j * VAR_BLOCKSIZE, y + i * VAR_BLOCKSIZE,
                                          VAR_BLOCKSIZE);
                blocks += 1;
            }
        }
        v.sort_unstable();
        let variance = 1 + v[blocks / MEAN_DIV];

        let bd = self.cfg.bit_depth as f64;
        let dqp = strength * (1.5 * (variance as f64).ln() - offset - 2.0 * (bd - 8.0));
        XVC_CLIP3(MIN_QP_OFFSET, MAX_QP_OFFSET, dqp as i32)
    }
}

fn calc_variance(plane: &crate::frame::Plane, bx: usize, by: usize, block_size: usize) -> u64 {
    let mut sum: u64 = 0;
    let mut squares: u64 = 0;
    let mut num: u64 = 0;
    for k in 0..block_size {
        for l in 0..block_size {
            let s = plane.at_clamped((bx + l) as isize, (by + k) as isize) as u64;
            sum += s;
            squares += s * s;
            num += 1;
        }
    }
    (256 * (squares - (sum * sum) / num)) / num
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{EncoderConfig, EncoderSettings};
    use crate::frame::Frame;
    use crate::picman::PictureData;

    fn encoder(width: usize, height: usize, qp: i32) -> XvceCtx {
        let cfg = EncoderConfig {
            width,
            height,
            qp,
            intra_period: 1,
            ..Default::default()
        };
        XvceCtx::new(&cfg, &EncoderSettings::default()).unwrap()
    }

    fn flat_frame(width: usize, height: usize, luma: pel, chroma: pel) -> Frame {
        let mut frame = Frame::new(width, height, ChromaFormat::CF_420, 8);
        for v in frame.planes[Y_C].data.iter_mut() {
            *v = luma;
        }
        for c in [U_C, V_C].iter() {
            for v in frame.planes[*c].data.iter_mut() {
                *v = chroma;
            }
        }
        frame
    }

    #[test]
    fn flat_ctu_codes_as_full_intra_dc_without_residual() {
        let mut ctx = encoder(64, 64, 22);
        let frame = flat_frame(64, 64, 128, 128);
        ctx.encode_pic(&frame).unwrap();

        let ctu = ctx.pic_data.get_ctu(CuTree::Primary, 0).unwrap();
        assert_eq!(ctu.get_split(), SplitType::None);
        assert!(ctu.is_intra());
        assert_eq!(ctu.pred.intra_dir[0], IntraPredDir::IPD_DC);
        assert!(!ctu.get_skip_flag());
        assert!(!ctu.get_cbf(YuvComponent::Y));
        assert!(!ctu.get_cbf(YuvComponent::U));
        assert!(!ctu.get_cbf(YuvComponent::V));
        assert_eq!(ctx.rec_pic.planes[Y_C].data, frame.planes[Y_C].data);
        assert_eq!(ctx.rec_pic.planes[U_C].data, frame.planes[U_C].data);
    }

    #[test]
    fn vertical_edge_prefers_vertical_binary_split() {
        let mut ctx = encoder(64, 64, 22);
        let mut frame = flat_frame(64, 64, 0, 128);
        for y in 0..64 {
            for x in 16..64 {
                frame.planes[Y_C].data[y * 64 + x] = 255;
            }
        }
        ctx.encode_pic(&frame).unwrap();
        let ctu = ctx.pic_data.get_ctu(CuTree::Primary, 0).unwrap();
        assert_eq!(ctu.get_split(), SplitType::Vertical);
    }

    #[test]
    fn adaptive_qp_delta_clips_at_lower_bound() {
        let mut ctx = encoder(64, 64, 32);
        ctx.settings.aqp_strength = 10;
        ctx.orig_pic = flat_frame(64, 64, 100, 100);
        /* zero variance: dqp = 1.0 * (1.5*ln(1) - 15 - 0) = -15, clipped */
        assert_eq!(ctx.calc_delta_qp_from_variance(0, 0, 64, 64), -3);
    }

    #[test]
    fn quad_split_skip_follows_truth_table() {
        let mut ctx = encoder(64, 64, 32);
        /* inter picture, max binary split depth 2 */
        ctx.pic_data = PictureData::new(64, 64, ChromaFormat::CF_420, false, false,
                                        crate::qp::Qp::new(32), 0, false, 2);
        let cu = ctx.pic_data.create_cu(CuTree::Primary, 0, 0, 0, 0, 64, 64);
        let mut covering = ctx.pic_data.create_cu(CuTree::Primary, 0, 0, 0, 0, 64, 64);
        covering.set_pred_mode(PredMode::Inter);
        ctx.pic_data.mark_used_in_pic(&covering);

        /* best was no-split in a non-intra picture: skip quad */
        assert!(ctx.can_skip_quad_split_for_cu(&cu, false));
        /* a deeper binary split in the best candidate vetoes the skip */
        assert!(!ctx.can_skip_quad_split_for_cu(&cu, true));

        /* intra picture never skips at this binary split depth */
        ctx.pic_data = PictureData::new(64, 64, ChromaFormat::CF_420, true, false,
                                        crate::qp::Qp::new(32), 0, false, 2);
        ctx.pic_data.mark_used_in_pic(&covering);
        assert!(!ctx.can_skip_quad_split_for_cu(&cu, false));
    }
}
