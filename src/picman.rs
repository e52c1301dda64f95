use crate::cu::CodingUnit;
use crate::def::*;
use crate::qp::Qp;
use crate::restrictions::Restrictions;

/* Which of {no split, binary splits, quad split} may be coded for a cu.
 * Both the rdo search and the split syntax derive from this one place, so
 * encoder and decoder always agree on what is signalable. */
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SplitEligibility {
    pub full: bool,
    pub hor: bool,
    pub ver: bool,
    pub quad: bool,
}

/* Per-4x4-block record of the last committed coding decision, used for
 * neighbor lookups (intra availability, merge candidates, split pruning).
 * Stored by value so the map never aliases the cu trees. */
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct CuInfo {
    pub coded: bool,
    pub pred_mode: PredMode,
    pub skip: bool,
    pub affine: bool,
    pub intra_dir: IntraPredDir,
    pub mv: Mv,
    pub refi: i8,
    pub depth: u8,
    pub binary_depth: u8,
    pub qp: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct MergeCand {
    pub mv: Mv,
    pub refi: i8,
}

/* Arena and lookup structures for the coding units of one picture */
pub(crate) struct PictureData {
    pic_width: usize,
    pic_height: usize,
    chroma_shift: usize,
    ctu_cols: usize,
    ctu_rows: usize,

    ctus: [Vec<Option<Box<CodingUnit>>>; MAX_NUM_CU_TREES],
    cu_map: [Vec<CuInfo>; MAX_NUM_CU_TREES],
    map_w: usize,

    free_cus: Vec<Box<CodingUnit>>,

    intra_pic: bool,
    highest_layer: bool,
    pic_qp: Qp,
    adaptive_qp: u8,
    secondary_tree: bool,
    max_depth: [u8; MAX_NUM_CU_TREES],
    max_binary_split_depth: [u8; MAX_NUM_CU_TREES],
    components: [Vec<YuvComponent>; MAX_NUM_CU_TREES],
}

impl PictureData {
    pub fn new(pic_width: usize, pic_height: usize, chroma_format: ChromaFormat,
               intra_pic: bool, highest_layer: bool, pic_qp: Qp, adaptive_qp: u8,
               chroma_cu_tree: bool, max_binary_split_depth: u8) -> Self {
        let ctu_cols = (pic_width + MAX_CU_SIZE - 1) / MAX_CU_SIZE;
        let ctu_rows = (pic_height + MAX_CU_SIZE - 1) / MAX_CU_SIZE;
        let map_w = (pic_width + MIN_CU_SIZE - 1) / MIN_CU_SIZE;
        let map_h = (pic_height + MIN_CU_SIZE - 1) / MIN_CU_SIZE;
        let has_chroma = chroma_format != ChromaFormat::CF_MONO;
        let secondary_tree = chroma_cu_tree && intra_pic && has_chroma;
        let components = if !has_chroma {
            [vec![YuvComponent::Y], vec![]]
        } else if secondary_tree {
            [vec![YuvComponent::Y], vec![YuvComponent::U, YuvComponent::V]]
        } else {
            [vec![YuvComponent::Y, YuvComponent::U, YuvComponent::V], vec![]]
        };
        PictureData {
            pic_width,
            pic_height,
            chroma_shift: 1,
            ctu_cols,
            ctu_rows,
            ctus: [
                (0..ctu_cols * ctu_rows).map(|_| None).collect(),
                (0..ctu_cols * ctu_rows).map(|_| None).collect(),
            ],
            cu_map: [
                vec![CuInfo::default(); map_w * map_h],
                vec![CuInfo::default(); map_w * map_h],
            ],
            map_w,
            free_cus: vec![],
            intra_pic,
            highest_layer,
            pic_qp,
            adaptive_qp,
            secondary_tree,
            max_depth: [MAX_CU_DEPTH as u8, MAX_CU_DEPTH_CHROMA as u8],
            max_binary_split_depth: [max_binary_split_depth, max_binary_split_depth],
            components,
        }
    }

    #[inline]
    pub fn get_pic_width(&self) -> usize {
        self.pic_width
    }

    #[inline]
    pub fn get_pic_height(&self) -> usize {
        self.pic_height
    }

    pub fn get_ctu_count(&self) -> usize {
        self.ctu_cols * self.ctu_rows
    }

    pub fn is_intra_pic(&self) -> bool {
        self.intra_pic
    }

    pub fn is_highest_layer(&self) -> bool {
        self.highest_layer
    }

    pub fn get_pic_qp(&self) -> Qp {
        self.pic_qp
    }

    pub fn get_adaptive_qp(&self) -> u8 {
        self.adaptive_qp
    }

    pub fn has_secondary_cu_tree(&self) -> bool {
        self.secondary_tree
    }

    pub fn get_components(&self, tree: CuTree) -> &[YuvComponent] {
        &self.components[tree as usize]
    }

    pub fn get_max_depth(&self, tree: CuTree) -> u8 {
        self.max_depth[tree as usize]
    }

    pub fn get_max_binary_split_depth(&self, tree: CuTree) -> u8 {
        self.max_binary_split_depth[tree as usize]
    }

    /*************************************************************************
     * ctu grid
     *************************************************************************/

    pub fn ctu_pos(&self, rsaddr: usize) -> (usize, usize) {
        ((rsaddr % self.ctu_cols) * MAX_CU_SIZE, (rsaddr / self.ctu_cols) * MAX_CU_SIZE)
    }

    pub fn init_ctu(&mut self, tree: CuTree, rsaddr: usize) {
        let (x, y) = self.ctu_pos(rsaddr);
        let ctu = self.create_cu(tree, 0, 0, x, y, MAX_CU_SIZE, MAX_CU_SIZE);
        if let Some(old) = self.ctus[tree as usize][rsaddr].take() {
            self.release_cu_tree(old);
        }
        self.ctus[tree as usize][rsaddr] = Some(ctu);
    }

    pub fn take_ctu(&mut self, tree: CuTree, rsaddr: usize) -> Option<Box<CodingUnit>> {
        self.ctus[tree as usize][rsaddr].take()
    }

    pub fn set_ctu(&mut self, tree: CuTree, rsaddr: usize, ctu: Box<CodingUnit>) {
        self.ctus[tree as usize][rsaddr] = Some(ctu);
    }

    pub fn get_ctu(&self, tree: CuTree, rsaddr: usize) -> Option<&CodingUnit> {
        self.ctus[tree as usize][rsaddr].as_deref()
    }

    /*************************************************************************
     * cu arena
     *************************************************************************/

    pub fn create_cu(&mut self, tree: CuTree, depth: u8, binary_depth: u8, x: usize, y: usize,
                     width: usize, height: usize) -> Box<CodingUnit> {
        let mut cu = self.free_cus.pop().unwrap_or_default();
        cu.init(tree, depth, binary_depth, x, y, width, height, self.chroma_shift);
        cu
    }

    pub fn release_cu(&mut self, cu: Box<CodingUnit>) {
        self.free_cus.push(cu);
    }

    /* return a whole subtree to the arena */
    pub fn release_cu_tree(&mut self, mut cu: Box<CodingUnit>) {
        for sub in cu.sub_cu.iter_mut() {
            if let Some(child) = sub.take() {
                self.release_cu_tree(child);
            }
        }
        cu.set_split(SplitType::None);
        self.free_cus.push(cu);
    }

    /* apply a split to the cu, creating the children that intersect the
     * picture */
    pub fn split_cu(&mut self, cu: &mut CodingUnit, split: SplitType) {
        debug_assert!(cu.get_split() == SplitType::None);
        let tree = cu.get_cu_tree();
        let geometry = cu.child_geometry(split);
        cu.set_split(split);
        for (i, geom) in geometry.iter().enumerate() {
            if let Some((x, y, w, h, depth, binary_depth)) = *geom {
                if x < self.pic_width && y < self.pic_height {
                    cu.sub_cu[i] = Some(self.create_cu(tree, depth, binary_depth, x, y, w, h));
                }
            }
        }
    }

    pub fn unsplit_cu(&mut self, cu: &mut CodingUnit) {
        for sub in cu.sub_cu.iter_mut() {
            if let Some(child) = sub.take() {
                self.release_cu_tree(child);
            }
        }
        cu.set_split(SplitType::None);
    }

    /*************************************************************************
     * cu map
     *************************************************************************/

    /* neighbor record at a luma sample position */
    pub fn get_cu_at(&self, tree: CuTree, x: usize, y: usize) -> Option<&CuInfo> {
        if x >= self.pic_width || y >= self.pic_height {
            return None;
        }
        let info = &self.cu_map[tree as usize][(y / MIN_CU_SIZE) * self.map_w + x / MIN_CU_SIZE];
        if info.coded {
            Some(info)
        } else {
            None
        }
    }

    fn set_map(&mut self, tree: CuTree, cu: &CodingUnit, info: CuInfo) {
        let x0 = cu.get_pos_x(YuvComponent::Y) / MIN_CU_SIZE;
        let y0 = cu.get_pos_y(YuvComponent::Y) / MIN_CU_SIZE;
        let x1 = ((cu.get_pos_x(YuvComponent::Y) + cu.get_width(YuvComponent::Y)).min(self.pic_width)
            + MIN_CU_SIZE - 1) / MIN_CU_SIZE;
        let y1 = ((cu.get_pos_y(YuvComponent::Y) + cu.get_height(YuvComponent::Y)).min(self.pic_height)
            + MIN_CU_SIZE - 1) / MIN_CU_SIZE;
        let map = &mut self.cu_map[tree as usize];
        for y in y0..y1 {
            for x in x0..x1 {
                map[y * self.map_w + x] = info;
            }
        }
    }

    /* (re-)assert a subtree's coverage of the map */
    pub fn mark_used_in_pic(&mut self, cu: &CodingUnit) {
        if cu.get_split() != SplitType::None {
            for i in 0..4 {
                if let Some(sub) = cu.sub_cu[i].as_deref() {
                    self.mark_used_in_pic(sub);
                }
            }
            return;
        }
        let info = CuInfo {
            coded: true,
            pred_mode: if cu.is_intra() { PredMode::Intra } else { PredMode::Inter },
            skip: cu.get_skip_flag(),
            affine: cu.pred.affine,
            intra_dir: cu.pred.intra_dir[0],
            mv: cu.pred.mv[REFP_0],
            refi: cu.pred.refi[REFP_0],
            depth: cu.get_depth(),
            binary_depth: cu.get_binary_depth(),
            qp: cu.get_qp().get_qp_raw(YuvComponent::Y),
        };
        self.set_map(cu.get_cu_tree(), cu, info);
    }

    pub fn clear_mark_cu_in_pic(&mut self, cu: &CodingUnit) {
        self.set_map(cu.get_cu_tree(), cu, CuInfo::default());
    }

    pub fn split_eligibility(&self, cu: &CodingUnit, restriction: SplitRestriction)
                             -> SplitEligibility {
        let max_tr_size = xvc_max_tr_size(&Restrictions::get());
        let tree = cu.get_cu_tree();
        let w = cu.get_width(YuvComponent::Y);
        let h = cu.get_height(YuvComponent::Y);
        let within = cu.is_fully_within_picture(self.pic_width, self.pic_height);
        let quad = cu.get_binary_depth() == 0 && cu.get_depth() < self.get_max_depth(tree);
        let can_binary = cu.is_binary_split_valid(self.get_max_binary_split_depth(tree))
            && within
            && w <= max_tr_size
            && h <= max_tr_size;
        SplitEligibility {
            full: within && w <= max_tr_size && h <= max_tr_size,
            hor: can_binary
                && restriction != SplitRestriction::NoHorizontal
                && h > MIN_BINARY_SPLIT_SIZE,
            ver: can_binary
                && restriction != SplitRestriction::NoVertical
                && w > MIN_BINARY_SPLIT_SIZE,
            quad,
        }
    }

    /*************************************************************************
     * merge candidate derivation (shared by encoder search and decoder
     * reconstruction; both sides see the same map state)
     *************************************************************************/

    pub fn get_merge_candidates(&self, cu: &CodingUnit) -> [MergeCand; NUM_INTER_MERGE_CANDIDATES] {
        let x = cu.get_pos_x(YuvComponent::Y);
        let y = cu.get_pos_y(YuvComponent::Y);
        let w = cu.get_width(YuvComponent::Y);
        let h = cu.get_height(YuvComponent::Y);
        let tree = cu.get_cu_tree();

        let positions: [(isize, isize); 5] = [
            (x as isize - 1, (y + h - 1) as isize),
            ((x + w - 1) as isize, y as isize - 1),
            ((x + w) as isize, y as isize - 1),
            (x as isize - 1, (y + h) as isize),
            (x as isize - 1, y as isize - 1),
        ];

        let mut cands = [MergeCand { mv: Mv::ZERO, refi: 0 }; NUM_INTER_MERGE_CANDIDATES];
        let mut count = 0;
        for &(nx, ny) in positions.iter() {
            if count == NUM_INTER_MERGE_CANDIDATES {
                break;
            }
            if nx < 0 || ny < 0 {
                continue;
            }
            if let Some(info) = self.get_cu_at(tree, nx as usize, ny as usize) {
                if info.pred_mode == PredMode::Inter && info.refi >= 0 {
                    let cand = MergeCand { mv: info.mv, refi: info.refi };
                    if !cands[..count].contains(&cand) {
                        cands[count] = cand;
                        count += 1;
                    }
                }
            }
        }
        /* remaining entries stay zero-mv on the first reference */
        cands
    }

    /* two-control-point motion for affine merge, from the top neighbor row */
    pub fn get_affine_merge_cand(&self, cu: &CodingUnit) -> (Mv, Mv) {
        let x = cu.get_pos_x(YuvComponent::Y);
        let y = cu.get_pos_y(YuvComponent::Y);
        let w = cu.get_width(YuvComponent::Y);
        let tree = cu.get_cu_tree();
        let v0 = if y > 0 {
            self.get_cu_at(tree, x, y - 1)
                .filter(|info| info.pred_mode == PredMode::Inter)
                .map(|info| info.mv)
                .unwrap_or(Mv::ZERO)
        } else {
            Mv::ZERO
        };
        let v1 = if y > 0 {
            self.get_cu_at(tree, x + w - 1, y - 1)
                .filter(|info| info.pred_mode == PredMode::Inter)
                .map(|info| info.mv)
                .unwrap_or(v0)
        } else {
            v0
        };
        (v0, v1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pic_data() -> PictureData {
        PictureData::new(128, 64, ChromaFormat::CF_420, false, false, Qp::new(32), 0, false, 2)
    }

    #[test]
    fn ctu_grid() {
        let pd = pic_data();
        assert_eq!(pd.get_ctu_count(), 2);
        assert_eq!(pd.ctu_pos(1), (64, 0));
    }

    #[test]
    fn arena_recycles() {
        let mut pd = pic_data();
        let cu = pd.create_cu(CuTree::Primary, 0, 0, 0, 0, 64, 64);
        pd.release_cu(cu);
        assert_eq!(pd.free_cus.len(), 1);
        let _cu = pd.create_cu(CuTree::Primary, 1, 0, 0, 0, 32, 32);
        assert_eq!(pd.free_cus.len(), 0);
    }

    #[test]
    fn split_skips_children_outside_picture() {
        /* ctu at x=64 in a 96-wide picture: right quad children start at
         * x=96 and are not created */
        let mut pd = PictureData::new(96, 64, ChromaFormat::CF_420, true, false, Qp::new(32), 0,
                                      false, 2);
        let mut cu = pd.create_cu(CuTree::Primary, 0, 0, 64, 0, 64, 64);
        pd.split_cu(&mut cu, SplitType::Quad);
        assert!(cu.sub_cu[0].is_some());
        assert!(cu.sub_cu[1].is_none());
        assert!(cu.sub_cu[2].is_some());
        assert!(cu.sub_cu[3].is_none());
        pd.unsplit_cu(&mut cu);
        pd.release_cu(cu);
    }

    #[test]
    fn mark_and_clear_map() {
        let mut pd = pic_data();
        let mut cu = pd.create_cu(CuTree::Primary, 0, 0, 0, 0, 8, 8);
        cu.set_pred_mode(PredMode::Inter);
        cu.pred.mv[REFP_0] = Mv::new(4, -4);
        cu.pred.refi[REFP_0] = 0;
        pd.mark_used_in_pic(&cu);
        let info = pd.get_cu_at(CuTree::Primary, 4, 4).unwrap();
        assert_eq!(info.mv, Mv::new(4, -4));
        pd.clear_mark_cu_in_pic(&cu);
        assert!(pd.get_cu_at(CuTree::Primary, 4, 4).is_none());
        pd.release_cu(cu);
    }

    #[test]
    fn merge_candidates_padded_with_zero_mv() {
        let mut pd = pic_data();
        let cu = pd.create_cu(CuTree::Primary, 0, 0, 0, 0, 16, 16);
        let cands = pd.get_merge_candidates(&cu);
        assert!(cands.iter().all(|c| c.mv == Mv::ZERO && c.refi == 0));
    }

    #[test]
    fn merge_candidates_pick_up_neighbors() {
        let mut pd = pic_data();
        let mut nb = pd.create_cu(CuTree::Primary, 0, 0, 0, 0, 16, 16);
        nb.set_pred_mode(PredMode::Inter);
        nb.pred.mv[REFP_0] = Mv::new(8, 0);
        nb.pred.refi[REFP_0] = 0;
        pd.mark_used_in_pic(&nb);
        let cu = pd.create_cu(CuTree::Primary, 0, 0, 16, 0, 16, 16);
        let cands = pd.get_merge_candidates(&cu);
        assert_eq!(cands[0].mv, Mv::new(8, 0));
        pd.release_cu(cu);
        pd.release_cu(nb);
    }
}
