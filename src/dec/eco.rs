use log::*;

use crate::api::XvcError;
use crate::cu::CodingUnit;
use crate::dec::bsr::XvcdBsr;
use crate::def::*;
use crate::picman::PictureData;
use crate::restrictions::Restrictions;

/* Coding-unit syntax parsing, the exact mirror of enc/eco.rs. Everything
 * parsed here is independent of neighbor state; neighbor-derived values
 * (merge lists, affine parameters, intra neighbors) are resolved during
 * reconstruction where both sides of the codec see the same map. */

pub(crate) fn xvcd_eco_ctu(bsr: &mut XvcdBsr<'_>, ctu: &mut Box<CodingUnit>,
                           pic_data: &mut PictureData) -> Result<bool, XvcError> {
    xvcd_eco_cu(bsr, ctu, pic_data, SplitRestriction::None)
}

fn xvcd_eco_cu(bsr: &mut XvcdBsr<'_>, cu: &mut Box<CodingUnit>, pic_data: &mut PictureData,
               restriction: SplitRestriction) -> Result<bool, XvcError> {
    let elig = pic_data.split_eligibility(cu, restriction);
    let any_split = elig.quad || elig.hor || elig.ver;
    let no_split = if elig.full && any_split {
        bsr.read1()? == 1
    } else {
        elig.full
    };

    if !no_split {
        let is_quad = if elig.quad && (elig.hor || elig.ver) {
            bsr.read1()? == 1
        } else {
            elig.quad
        };
        let split = if is_quad {
            SplitType::Quad
        } else {
            let is_ver = if elig.hor && elig.ver {
                bsr.read1()? == 1
            } else {
                elig.ver
            };
            if is_ver {
                SplitType::Vertical
            } else {
                SplitType::Horizontal
            }
        };
        pic_data.split_cu(cu, split);
        let mut any_cbf = false;
        let mut sub_restriction = SplitRestriction::None;
        for i in 0..4 {
            if let Some(mut sub_cu) = cu.sub_cu[i].take() {
                any_cbf |= xvcd_eco_cu(bsr, &mut sub_cu, pic_data, sub_restriction)?;
                sub_restriction = sub_cu.derive_sibling_split_restriction(split);
                cu.sub_cu[i] = Some(sub_cu);
            }
        }
        return Ok(any_cbf);
    }

    /* leaf */
    let components = {
        let list = pic_data.get_components(cu.get_cu_tree());
        let mut comps = [YuvComponent::Y; 3];
        comps[..list.len()].copy_from_slice(list);
        (comps, list.len())
    };
    let mut any_cbf = false;
    for &comp in components.0[..components.1].iter() {
        xvcd_eco_unit(bsr, cu, comp, pic_data)?;
        any_cbf |= cu.get_cbf(comp);
    }
    Ok(any_cbf)
}

fn xvcd_eco_unit(bsr: &mut XvcdBsr<'_>, cu: &mut CodingUnit, comp: YuvComponent,
                 pic_data: &PictureData) -> Result<(), XvcError> {
    let r = Restrictions::get();
    let first_comp = pic_data.get_components(cu.get_cu_tree())[0] == comp;
    if first_comp {
        cu.reset_prediction_state();
        if !pic_data.is_intra_pic() {
            let skip = if !r.disable_inter_skip_mode { bsr.read1()? == 1 } else { false };
            if skip {
                cu.set_pred_mode(PredMode::Inter);
                cu.set_skip_flag(true);
                cu.set_merge_flag(true);
                xvcd_eco_merge_params(bsr, cu)?;
                cu.set_root_cbf(false);
                return Ok(());
            }
            let is_intra = bsr.read1()? == 1;
            cu.set_pred_mode(if is_intra { PredMode::Intra } else { PredMode::Inter });
        } else {
            cu.set_pred_mode(PredMode::Intra);
        }
        if cu.is_intra() {
            let dir = bsr.read_ue()?;
            if dir >= IPD_CNT as u32 {
                debug!("invalid intra prediction direction {}", dir);
                return Err(XvcError::XVC_ERR_MALFORMED_BITSTREAM);
            }
            cu.pred.intra_dir = [IntraPredDir::from(dir); 2];
        } else {
            let merge = if !r.disable_inter_merge_mode { bsr.read1()? == 1 } else { false };
            cu.set_merge_flag(merge);
            if merge {
                xvcd_eco_merge_params(bsr, cu)?;
            } else {
                if !r.disable_ext2_inter_adaptive_fullpel_mv {
                    cu.pred.fullpel_mv = bsr.read1()? == 1;
                }
                if !r.disable_ext2_inter_local_illumination_comp {
                    cu.pred.lic = bsr.read1()? == 1;
                }
                let mvd_x = bsr.read_se()?;
                let mvd_y = bsr.read_se()?;
                cu.pred.mvd[REFP_0] = Mv::new(mvd_x as i16, mvd_y as i16);
                cu.pred.refi[REFP_0] = 0;
            }
            let root_cbf = bsr.read1()? == 1;
            cu.set_root_cbf(root_cbf);
            if !root_cbf {
                cu.set_cbf(comp, false);
                return Ok(());
            }
        }
        xvcd_eco_cbf_and_residual(bsr, cu, comp)?;
    } else {
        if cu.is_inter() && (cu.get_skip_flag() || !cu.get_root_cbf()) {
            cu.set_cbf(comp, false);
            return Ok(());
        }
        xvcd_eco_cbf_and_residual(bsr, cu, comp)?;
    }
    Ok(())
}

fn xvcd_eco_merge_params(bsr: &mut XvcdBsr<'_>, cu: &mut CodingUnit) -> Result<(), XvcError> {
    let r = Restrictions::get();
    if cu.can_affine_merge() && !r.disable_ext2_inter_affine && !r.disable_ext2_inter_affine_merge
    {
        cu.pred.affine = bsr.read1()? == 1;
    }
    if !cu.pred.affine {
        let merge_idx = if !r.disable_inter_merge_candidates { bsr.read_ue()? } else { 0 };
        if merge_idx >= NUM_INTER_MERGE_CANDIDATES as u32 {
            debug!("invalid merge candidate index {}", merge_idx);
            return Err(XvcError::XVC_ERR_MALFORMED_BITSTREAM);
        }
        cu.set_merge_idx(merge_idx as i8);
    } else {
        cu.set_merge_idx(0);
    }
    cu.pred.refi[REFP_0] = 0;
    Ok(())
}

fn xvcd_eco_cbf_and_residual(bsr: &mut XvcdBsr<'_>, cu: &mut CodingUnit, comp: YuvComponent)
                             -> Result<(), XvcError> {
    let r = Restrictions::get();
    let cbf = if r.disable_transform_cbf { true } else { bsr.read1()? == 1 };
    cu.set_cbf(comp, cbf);
    cu.set_transform_skip(comp, false);
    if comp.is_luma() {
        cu.set_transform_from_select_idx(comp, -1);
    }
    if !cbf {
        return Ok(());
    }

    /* transform info */
    if cu.can_transform_skip(comp) && !r.disable_transform_skip {
        cu.set_transform_skip(comp, bsr.read1()? == 1);
    }
    if comp.is_luma() && !cu.get_transform_skip(comp) && !r.disable_ext_transform_select {
        if bsr.read1()? == 1 {
            let idx = bsr.read(2)?;
            cu.set_transform_from_select_idx(comp, idx as i8);
        }
    }

    /* coefficients */
    let len = cu.get_width(comp) * cu.get_height(comp);
    let mut last = bsr.read_ue()? as usize;
    {
        let coef = cu.get_coeff_mut(comp);
        for c in coef.iter_mut() {
            *c = 0;
        }
    }
    if r.disable_transform_cbf {
        /* last position carries a +1 offset so an empty block is codable */
        if last == 0 {
            return Ok(());
        }
        last -= 1;
    }
    if last >= len {
        debug!("last coefficient position {} outside block of {}", last, len);
        return Err(XvcError::XVC_ERR_MALFORMED_BITSTREAM);
    }
    for i in 0..=last {
        let sig = if i < last { bsr.read1()? == 1 } else { true };
        if !sig {
            continue;
        }
        let negative = bsr.read1()? == 1;
        let level = bsr.read_ue()? as i64 + 1;
        if level > i16::MAX as i64 {
            return Err(XvcError::XVC_ERR_MALFORMED_BITSTREAM);
        }
        cu.get_coeff_mut(comp)[i] = if negative { -(level as Coeff) } else { level as Coeff };
    }
    Ok(())
}

pub(crate) fn xvcd_eco_qp(bsr: &mut XvcdBsr<'_>, predicted_qp: i32) -> Result<i32, XvcError> {
    Ok(predicted_qp + bsr.read_se()?)
}
