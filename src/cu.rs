use crate::def::*;
use crate::frame::Frame;
use crate::qp::Qp;
use crate::restrictions::Restrictions;

/* Prediction parameters of one coding unit, separated out so the cu cache
 * can store and donate them without touching residual state. */
#[derive(Clone, Debug, Default)]
pub(crate) struct PredictionState {
    pub pred_mode: PredMode,
    pub skip_flag: bool,
    pub merge_flag: bool,
    pub merge_idx: i8,
    pub affine: bool,
    pub lic: bool,
    pub fullpel_mv: bool,
    pub intra_dir: [IntraPredDir; 2],
    pub mv: [Mv; REFP_NUM],
    pub mvd: [Mv; REFP_NUM],
    pub refi: [i8; REFP_NUM],
}

/* Snapshot of the reconstructed samples inside a cu footprint. One buffer
 * is owned per rdo recursion depth. */
#[derive(Clone, Debug, Default)]
pub(crate) struct ReconstructionState {
    reco: [Vec<pel>; N_C],
}

/* Reconstruction plus residual coding state, used when one cu object is
 * re-evaluated in place (merge candidate loop, intra mode loop). */
#[derive(Clone, Debug, Default)]
pub(crate) struct ResidualState {
    reco: ReconstructionState,
    coef: [Vec<Coeff>; N_C],
    cbf: [bool; N_C],
    root_cbf: bool,
    tx_select_idx: i8,
    tx_skip: [bool; N_C],
}

/* A node in the coding-unit tree. Either a leaf carrying the prediction and
 * residual payload, or a split node owning its children. */
#[derive(Debug, Default)]
pub(crate) struct CodingUnit {
    tree_idx: usize,
    depth: u8,
    binary_depth: u8,
    /* position and size in luma samples */
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    chroma_shift: usize,

    split: SplitType,
    pub(crate) sub_cu: [Option<Box<CodingUnit>>; 4],

    pub(crate) pred: PredictionState,
    cbf: [bool; N_C],
    root_cbf: bool,
    tx_select_idx: i8,
    tx_skip: [bool; N_C],
    qp: Qp,
    coef: [Vec<Coeff>; N_C],
}

impl CodingUnit {
    pub fn init(&mut self, tree: CuTree, depth: u8, binary_depth: u8, x: usize, y: usize,
                width: usize, height: usize, chroma_shift: usize) {
        self.tree_idx = tree as usize;
        self.depth = depth;
        self.binary_depth = binary_depth;
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
        self.chroma_shift = chroma_shift;
        self.split = SplitType::None;
        for sub in self.sub_cu.iter_mut() {
            debug_assert!(sub.is_none());
        }
        self.reset_prediction_state();
        self.tx_select_idx = -1;
        self.cbf = [false; N_C];
        self.root_cbf = false;
        self.tx_skip = [false; N_C];
    }

    pub fn get_cu_tree(&self) -> CuTree {
        if self.tree_idx == 0 {
            CuTree::Primary
        } else {
            CuTree::Secondary
        }
    }

    #[inline]
    pub fn get_depth(&self) -> u8 {
        self.depth
    }

    #[inline]
    pub fn get_binary_depth(&self) -> u8 {
        self.binary_depth
    }

    #[inline]
    pub fn get_split(&self) -> SplitType {
        self.split
    }

    #[inline]
    fn comp_shift(&self, comp: YuvComponent) -> usize {
        if comp.is_luma() {
            0
        } else {
            self.chroma_shift
        }
    }

    #[inline]
    pub fn get_pos_x(&self, comp: YuvComponent) -> usize {
        self.x >> self.comp_shift(comp)
    }

    #[inline]
    pub fn get_pos_y(&self, comp: YuvComponent) -> usize {
        self.y >> self.comp_shift(comp)
    }

    #[inline]
    pub fn get_width(&self, comp: YuvComponent) -> usize {
        self.width >> self.comp_shift(comp)
    }

    #[inline]
    pub fn get_height(&self, comp: YuvComponent) -> usize {
        self.height >> self.comp_shift(comp)
    }

    #[inline]
    pub fn get_qp(&self) -> Qp {
        self.qp
    }

    pub fn set_qp(&mut self, qp: Qp) {
        self.qp = qp;
    }

    pub fn is_fully_within_picture(&self, pic_width: usize, pic_height: usize) -> bool {
        self.x + self.width <= pic_width && self.y + self.height <= pic_height
    }

    pub fn is_binary_split_valid(&self, max_binary_split_depth: u8) -> bool {
        self.binary_depth < max_binary_split_depth
    }

    /* first (top-left) child position of the quad split at parent_depth */
    pub fn is_first_cu_in_quad(&self, parent_depth: u8) -> bool {
        let parent_size = MAX_CU_SIZE >> parent_depth;
        (self.x % parent_size) == 0 && (self.y % parent_size) == 0
    }

    pub fn is_intra(&self) -> bool {
        self.pred.pred_mode == PredMode::Intra
    }

    pub fn is_inter(&self) -> bool {
        self.pred.pred_mode == PredMode::Inter
    }

    pub fn get_skip_flag(&self) -> bool {
        self.pred.skip_flag
    }

    #[inline]
    pub fn get_cbf(&self, comp: YuvComponent) -> bool {
        self.cbf[comp.idx()]
    }

    pub fn set_cbf(&mut self, comp: YuvComponent, cbf: bool) {
        self.cbf[comp.idx()] = cbf;
    }

    pub fn clear_cbf(&mut self, comp: YuvComponent) {
        self.cbf[comp.idx()] = false;
    }

    pub fn get_has_any_cbf(&self) -> bool {
        self.cbf[Y_C] || self.cbf[U_C] || self.cbf[V_C]
    }

    pub fn get_root_cbf(&self) -> bool {
        self.root_cbf
    }

    pub fn set_root_cbf(&mut self, root_cbf: bool) {
        self.root_cbf = root_cbf;
    }

    pub fn get_transform_select_idx(&self) -> i8 {
        self.tx_select_idx
    }

    pub fn has_transform_select_idx(&self) -> bool {
        self.tx_select_idx >= 0
    }

    /* tx_select < 0 selects the plain transform */
    pub fn set_transform_from_select_idx(&mut self, comp: YuvComponent, tx_select: i8) {
        if comp.is_luma() {
            self.tx_select_idx = tx_select;
        }
    }

    pub fn get_transform_skip(&self, comp: YuvComponent) -> bool {
        self.tx_skip[comp.idx()]
    }

    pub fn set_transform_skip(&mut self, comp: YuvComponent, skip: bool) {
        self.tx_skip[comp.idx()] = skip;
    }

    pub fn can_transform_skip(&self, comp: YuvComponent) -> bool {
        self.get_width(comp) * self.get_height(comp) <= TRANSFORM_SKIP_MAX_AREA
    }

    pub fn can_affine_merge(&self) -> bool {
        self.width >= AFFINE_MIN_SIZE && self.height >= AFFINE_MIN_SIZE
    }

    pub fn get_coeff(&self, comp: YuvComponent) -> &[Coeff] {
        &self.coef[comp.idx()]
    }

    pub fn get_coeff_mut(&mut self, comp: YuvComponent) -> &mut Vec<Coeff> {
        let size = self.get_width(comp) * self.get_height(comp);
        let coef = &mut self.coef[comp.idx()];
        if coef.len() != size {
            coef.resize(size, 0);
        }
        coef
    }

    pub fn reset_prediction_state(&mut self) {
        self.pred = PredictionState::default();
        self.pred.merge_idx = -1;
        self.pred.refi = [-1; REFP_NUM];
    }

    pub fn set_pred_mode(&mut self, mode: PredMode) {
        self.pred.pred_mode = mode;
    }

    pub fn set_skip_flag(&mut self, skip: bool) {
        self.pred.skip_flag = skip;
    }

    pub fn set_merge_flag(&mut self, merge: bool) {
        self.pred.merge_flag = merge;
    }

    pub fn set_merge_idx(&mut self, idx: i8) {
        self.pred.merge_idx = idx;
    }

    pub fn copy_position_and_size_from(&mut self, other: &CodingUnit) {
        self.tree_idx = other.tree_idx;
        self.depth = other.depth;
        self.binary_depth = other.binary_depth;
        self.x = other.x;
        self.y = other.y;
        self.width = other.width;
        self.height = other.height;
        self.chroma_shift = other.chroma_shift;
    }

    pub fn copy_prediction_data_from(&mut self, pred: &PredictionState) {
        self.pred = pred.clone();
    }

    /* After the first child of a binary split has chosen its own split, the
     * sibling is forbidden the split axis that would re-create a tiling
     * already expressible as a quad split. */
    pub fn derive_sibling_split_restriction(&self, parent_split: SplitType) -> SplitRestriction {
        if Restrictions::get().disable_ext_implicit_partition_type {
            return SplitRestriction::None;
        }
        match (parent_split, self.split) {
            (SplitType::Horizontal, SplitType::Vertical) => SplitRestriction::NoVertical,
            (SplitType::Vertical, SplitType::Horizontal) => SplitRestriction::NoHorizontal,
            _ => SplitRestriction::None,
        }
    }

    /* split geometry of each child; children fully outside the picture are
     * not instantiated */
    pub fn child_geometry(&self, split: SplitType) -> [Option<(usize, usize, usize, usize, u8, u8)>; 4] {
        let (x, y, w, h) = (self.x, self.y, self.width, self.height);
        let mut out = [None; 4];
        match split {
            SplitType::Quad => {
                let (hw, hh) = (w / 2, h / 2);
                out[0] = Some((x, y, hw, hh, self.depth + 1, 0));
                out[1] = Some((x + hw, y, hw, hh, self.depth + 1, 0));
                out[2] = Some((x, y + hh, hw, hh, self.depth + 1, 0));
                out[3] = Some((x + hw, y + hh, hw, hh, self.depth + 1, 0));
            }
            SplitType::Horizontal => {
                let hh = h / 2;
                out[0] = Some((x, y, w, hh, self.depth, self.binary_depth + 1));
                out[1] = Some((x, y + hh, w, hh, self.depth, self.binary_depth + 1));
            }
            SplitType::Vertical => {
                let hw = w / 2;
                out[0] = Some((x, y, hw, h, self.depth, self.binary_depth + 1));
                out[1] = Some((x + hw, y, hw, h, self.depth, self.binary_depth + 1));
            }
            SplitType::None => {}
        }
        out
    }

    pub fn set_split(&mut self, split: SplitType) {
        self.split = split;
    }

    /*************************************************************************
     * state snapshots for the rdo search
     *************************************************************************/

    pub fn save_state_to(&self, state: &mut ReconstructionState, rec_pic: &Frame,
                         components: &[YuvComponent]) {
        for &comp in components {
            let c = comp.idx();
            let (x, y) = (self.get_pos_x(comp), self.get_pos_y(comp));
            let (w, h) = (self.footprint_width(comp, rec_pic), self.footprint_height(comp, rec_pic));
            state.reco[c].resize(w * h, 0);
            rec_pic.read_block(c, x, y, w, h, &mut state.reco[c]);
        }
    }

    pub fn load_state_from(&self, state: &ReconstructionState, rec_pic: &mut Frame,
                           components: &[YuvComponent]) {
        for &comp in components {
            let c = comp.idx();
            let (x, y) = (self.get_pos_x(comp), self.get_pos_y(comp));
            let (w, h) = (self.footprint_width(comp, rec_pic), self.footprint_height(comp, rec_pic));
            rec_pic.write_block(c, x, y, w, h, &state.reco[c]);
        }
    }

    pub fn save_residual_state_to(&self, state: &mut ResidualState, rec_pic: &Frame,
                                  components: &[YuvComponent]) {
        self.save_state_to(&mut state.reco, rec_pic, components);
        for &comp in components {
            let c = comp.idx();
            state.coef[c].clear();
            state.coef[c].extend_from_slice(&self.coef[c]);
        }
        state.cbf = self.cbf;
        state.root_cbf = self.root_cbf;
        state.tx_select_idx = self.tx_select_idx;
        state.tx_skip = self.tx_skip;
    }

    pub fn load_residual_state_from(&mut self, state: &ResidualState, rec_pic: &mut Frame,
                                    components: &[YuvComponent]) {
        self.load_state_from(&state.reco, rec_pic, components);
        for &comp in components {
            let c = comp.idx();
            self.coef[c].clear();
            self.coef[c].extend_from_slice(&state.coef[c]);
        }
        self.cbf = state.cbf;
        self.root_cbf = state.root_cbf;
        self.tx_select_idx = state.tx_select_idx;
        self.tx_skip = state.tx_skip;
    }

    /* footprint clipped against the picture, for boundary CUs */
    fn footprint_width(&self, comp: YuvComponent, pic: &Frame) -> usize {
        let x = self.get_pos_x(comp);
        self.get_width(comp).min(pic.planes[comp.idx()].width - x)
    }

    fn footprint_height(&self, comp: YuvComponent, pic: &Frame) -> usize {
        let y = self.get_pos_y(comp);
        self.get_height(comp).min(pic.planes[comp.idx()].height - y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_cu(x: usize, y: usize, w: usize, h: usize) -> CodingUnit {
        let mut cu = CodingUnit::default();
        cu.init(CuTree::Primary, 0, 0, x, y, w, h, 1);
        cu
    }

    #[test]
    fn component_geometry() {
        let cu = make_cu(64, 32, 32, 16);
        assert_eq!(cu.get_pos_x(YuvComponent::Y), 64);
        assert_eq!(cu.get_pos_x(YuvComponent::U), 32);
        assert_eq!(cu.get_width(YuvComponent::V), 16);
        assert_eq!(cu.get_height(YuvComponent::U), 8);
    }

    #[test]
    fn quad_children_tile_parent() {
        let cu = make_cu(0, 0, 64, 64);
        let geom = cu.child_geometry(SplitType::Quad);
        let mut area = 0;
        for g in geom.iter().flatten() {
            area += g.2 * g.3;
            assert_eq!(g.4, 1);
            assert_eq!(g.5, 0);
        }
        assert_eq!(area, 64 * 64);
    }

    #[test]
    fn binary_children_keep_depth() {
        let cu = make_cu(0, 0, 64, 64);
        let geom = cu.child_geometry(SplitType::Horizontal);
        assert_eq!(geom[0], Some((0, 0, 64, 32, 0, 1)));
        assert_eq!(geom[1], Some((0, 32, 64, 32, 0, 1)));
        assert!(geom[2].is_none());
    }

    #[test]
    fn sibling_split_restriction_rules_out_quad_equivalent() {
        let mut cu = make_cu(0, 0, 32, 16);
        cu.set_split(SplitType::Vertical);
        assert_eq!(
            cu.derive_sibling_split_restriction(SplitType::Horizontal),
            SplitRestriction::NoVertical
        );
        assert_eq!(
            cu.derive_sibling_split_restriction(SplitType::Vertical),
            SplitRestriction::None
        );
        cu.set_split(SplitType::Horizontal);
        assert_eq!(
            cu.derive_sibling_split_restriction(SplitType::Vertical),
            SplitRestriction::NoHorizontal
        );
    }

    #[test]
    fn first_cu_in_quad() {
        let cu = make_cu(32, 32, 32, 32);
        assert!(cu.is_first_cu_in_quad(1));
        assert!(!cu.is_first_cu_in_quad(0));
    }

    #[test]
    fn transform_skip_only_small_blocks() {
        let cu = make_cu(0, 0, 8, 8);
        assert!(!cu.can_transform_skip(YuvComponent::Y));
        assert!(cu.can_transform_skip(YuvComponent::U));
        let cu4 = make_cu(0, 0, 4, 4);
        assert!(cu4.can_transform_skip(YuvComponent::Y));
    }
}
