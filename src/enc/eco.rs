use crate::cu::CodingUnit;
use crate::def::*;
use crate::picman::PictureData;
use crate::restrictions::Restrictions;

/* Syntax writing for coding units.
 *
 * The same functions run against the real bitstream writer and against the
 * counting writer used by the rdo search, so the bits the search accounts
 * for are exactly the bits the encoder emits. */

pub(crate) trait SyntaxWriter {
    fn write1(&mut self, val: u32);
    fn write(&mut self, val: u32, len: u32);

    fn write_ue(&mut self, val: u32) {
        let v1 = val + 1;
        let len = 32 - v1.leading_zeros();
        if len > 1 {
            self.write(0, len - 1);
        }
        self.write(v1, len);
    }

    fn write_se(&mut self, val: i32) {
        let v = if val > 0 { (val * 2 - 1) as u32 } else { (-val * 2) as u32 };
        self.write_ue(v);
    }

    fn get_num_written_bits(&self) -> Bits;
    fn get_fractional_bits(&self) -> u32;
    fn reset_bit_counting(&mut self);
}

/* Speculative writer: advances the bit counters without producing output.
 * Cheap to copy, which the rdo search does at every branch point. */
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RdoSyntaxWriter {
    num_bits: Bits,
    frac_bits: u32,
}

impl RdoSyntaxWriter {
    pub fn new(start_bits: Bits, frac_bits: u32) -> Self {
        RdoSyntaxWriter {
            num_bits: start_bits,
            frac_bits,
        }
    }
}

impl SyntaxWriter for RdoSyntaxWriter {
    fn write1(&mut self, _val: u32) {
        self.num_bits += 1;
        self.frac_bits = self.frac_bits.wrapping_add(1 << FRAC_BITS_SHIFT);
    }

    fn write(&mut self, _val: u32, len: u32) {
        self.num_bits += len;
        self.frac_bits = self.frac_bits.wrapping_add(len << FRAC_BITS_SHIFT);
    }

    fn get_num_written_bits(&self) -> Bits {
        self.num_bits
    }

    fn get_fractional_bits(&self) -> u32 {
        self.frac_bits
    }

    fn reset_bit_counting(&mut self) {
        self.num_bits = 0;
        self.frac_bits = 0;
    }
}

/*****************************************************************************
 * split syntax
 *****************************************************************************/

pub(crate) fn xvce_eco_split<W: SyntaxWriter>(cu: &CodingUnit, pic_data: &PictureData,
                                              restriction: SplitRestriction, writer: &mut W) {
    let elig = pic_data.split_eligibility(cu, restriction);
    let split = cu.get_split();
    let any_split = elig.quad || elig.hor || elig.ver;
    if elig.full && any_split {
        writer.write1((split == SplitType::None) as u32);
    }
    if split == SplitType::None {
        return;
    }
    if elig.quad && (elig.hor || elig.ver) {
        writer.write1((split == SplitType::Quad) as u32);
    }
    if split != SplitType::Quad && elig.hor && elig.ver {
        writer.write1((split == SplitType::Vertical) as u32);
    }
}

/*****************************************************************************
 * per-component cu syntax
 *****************************************************************************/

pub(crate) fn xvce_eco_unit<W: SyntaxWriter>(cu: &CodingUnit, comp: YuvComponent,
                                             pic_data: &PictureData, writer: &mut W) {
    let r = Restrictions::get();
    let first_comp = pic_data.get_components(cu.get_cu_tree())[0] == comp;
    if first_comp {
        if !pic_data.is_intra_pic() {
            if !r.disable_inter_skip_mode {
                writer.write1(cu.get_skip_flag() as u32);
            }
            if cu.get_skip_flag() {
                xvce_eco_merge_params(cu, writer);
                return;
            }
            writer.write1(cu.is_intra() as u32);
        }
        if cu.is_intra() {
            writer.write_ue(cu.pred.intra_dir[0] as u32);
        } else {
            if !r.disable_inter_merge_mode {
                writer.write1(cu.pred.merge_flag as u32);
            }
            if cu.pred.merge_flag {
                xvce_eco_merge_params(cu, writer);
            } else {
                if !r.disable_ext2_inter_adaptive_fullpel_mv {
                    writer.write1(cu.pred.fullpel_mv as u32);
                }
                if !r.disable_ext2_inter_local_illumination_comp {
                    writer.write1(cu.pred.lic as u32);
                }
                writer.write_se(cu.pred.mvd[REFP_0].x as i32);
                writer.write_se(cu.pred.mvd[REFP_0].y as i32);
            }
            xvce_eco_root_cbf(cu.get_root_cbf(), writer);
            if !cu.get_root_cbf() {
                return;
            }
        }
        xvce_eco_cbf(cu.get_cbf(comp), writer);
        if cu.get_cbf(comp) {
            xvce_eco_tx_info(cu, comp, writer);
            xvce_eco_coef(cu.get_coeff(comp), writer);
        }
    } else {
        /* chroma carries no residual for skip or root-cbf-zero units */
        if cu.is_inter() && (cu.get_skip_flag() || !cu.get_root_cbf()) {
            return;
        }
        xvce_eco_cbf(cu.get_cbf(comp), writer);
        if cu.get_cbf(comp) {
            xvce_eco_tx_info(cu, comp, writer);
            xvce_eco_coef(cu.get_coeff(comp), writer);
        }
    }
}

pub(crate) fn xvce_eco_merge_params<W: SyntaxWriter>(cu: &CodingUnit, writer: &mut W) {
    let r = Restrictions::get();
    if cu.can_affine_merge() && !r.disable_ext2_inter_affine && !r.disable_ext2_inter_affine_merge
    {
        writer.write1(cu.pred.affine as u32);
    }
    if !cu.pred.affine && !r.disable_inter_merge_candidates {
        writer.write_ue(cu.pred.merge_idx as u32);
    }
}

pub(crate) fn xvce_eco_root_cbf<W: SyntaxWriter>(root_cbf: bool, writer: &mut W) {
    writer.write1(root_cbf as u32);
}

pub(crate) fn xvce_eco_cbf<W: SyntaxWriter>(cbf: bool, writer: &mut W) {
    if Restrictions::get().disable_transform_cbf {
        /* cbf is implied when the flag is restricted away */
        return;
    }
    writer.write1(cbf as u32);
}

fn xvce_eco_tx_info<W: SyntaxWriter>(cu: &CodingUnit, comp: YuvComponent, writer: &mut W) {
    let r = Restrictions::get();
    if cu.can_transform_skip(comp) && !r.disable_transform_skip {
        writer.write1(cu.get_transform_skip(comp) as u32);
    }
    if comp.is_luma() && !cu.get_transform_skip(comp) && !r.disable_ext_transform_select {
        writer.write1(cu.has_transform_select_idx() as u32);
        if cu.has_transform_select_idx() {
            writer.write(cu.get_transform_select_idx() as u32, 2);
        }
    }
}

/* Raster-scan significance map with exp-golomb levels. When the cbf flag
 * is restricted away an all-zero block must be representable, so the last
 * position is coded with a +1 offset and 0 means empty. */
pub(crate) fn xvce_eco_coef<W: SyntaxWriter>(coef: &[Coeff], writer: &mut W) {
    let allow_empty = Restrictions::get().disable_transform_cbf;
    let last = match coef.iter().rposition(|&c| c != 0) {
        Some(last) => last,
        None => {
            debug_assert!(allow_empty);
            writer.write_ue(0);
            return;
        }
    };
    writer.write_ue(last as u32 + allow_empty as u32);
    for i in 0..=last {
        let c = coef[i];
        if i < last {
            writer.write1((c != 0) as u32);
        }
        if c != 0 {
            writer.write1((c < 0) as u32);
            writer.write_ue((c.unsigned_abs() - 1) as u32);
        }
    }
}

/* cbf plus residual payload, the piece the transform engine prices when it
 * weighs residual decisions */
pub(crate) fn xvce_eco_residual_rdo_cbf<W: SyntaxWriter>(cu: &CodingUnit, comp: YuvComponent,
                                                         writer: &mut W) {
    xvce_eco_cbf(cu.get_cbf(comp), writer);
    if cu.get_cbf(comp) {
        xvce_eco_tx_info(cu, comp, writer);
        xvce_eco_coef(cu.get_coeff(comp), writer);
    }
}

/*****************************************************************************
 * ctu syntax, bitstream-canonical order
 *****************************************************************************/

pub(crate) fn xvce_eco_ctu<W: SyntaxWriter>(ctu: &CodingUnit, pic_data: &PictureData,
                                            writer: &mut W) -> bool {
    xvce_eco_cu(ctu, pic_data, SplitRestriction::None, writer)
}

fn xvce_eco_cu<W: SyntaxWriter>(cu: &CodingUnit, pic_data: &PictureData,
                                restriction: SplitRestriction, writer: &mut W) -> bool {
    xvce_eco_split(cu, pic_data, restriction, writer);
    if cu.get_split() == SplitType::None {
        let mut any_cbf = false;
        for &comp in pic_data.get_components(cu.get_cu_tree()) {
            xvce_eco_unit(cu, comp, pic_data, writer);
            any_cbf |= cu.get_cbf(comp);
        }
        return any_cbf;
    }
    let split = cu.get_split();
    let mut any_cbf = false;
    let mut sub_restriction = SplitRestriction::None;
    for i in 0..4 {
        if let Some(sub) = cu.sub_cu[i].as_deref() {
            any_cbf |= xvce_eco_cu(sub, pic_data, sub_restriction, writer);
            sub_restriction = sub.derive_sibling_split_restriction(split);
        }
    }
    any_cbf
}

pub(crate) fn xvce_eco_qp<W: SyntaxWriter>(qp_raw: i32, predicted_qp: i32, writer: &mut W) {
    writer.write_se(qp_raw - predicted_qp);
}

pub(crate) fn xvce_eco_end_of_slice<W: SyntaxWriter>(last: bool, writer: &mut W) {
    writer.write1(last as u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rdo_writer_counts_like_a_real_writer() {
        use crate::enc::bsw::XvceBsw;
        let mut rdo = RdoSyntaxWriter::new(0, 0);
        let mut bsw = XvceBsw::new();
        for v in [0u32, 3, 17, 255].iter() {
            rdo.write_ue(*v);
            bsw.write_ue(*v);
            rdo.write_se(-(*v as i32));
            bsw.write_se(-(*v as i32));
        }
        assert_eq!(rdo.get_num_written_bits(), bsw.get_num_written_bits());
        assert_eq!(rdo.get_fractional_bits(), bsw.get_fractional_bits());
    }

    #[test]
    fn coef_coding_counts_significance() {
        let coef: Vec<Coeff> = vec![5, 0, -1, 0];
        let mut rdo = RdoSyntaxWriter::new(0, 0);
        xvce_eco_coef(&coef, &mut rdo);
        /* last position, one significance flag, two signed levels */
        assert!(rdo.get_num_written_bits() > 4);
    }
}
