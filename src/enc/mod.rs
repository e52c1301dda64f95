pub(crate) mod bsw;
pub(crate) mod cache;
pub(crate) mod eco;
pub(crate) mod mode;
pub(crate) mod pinter;
pub(crate) mod pintra;
pub(crate) mod sad;
pub(crate) mod tq;

use std::sync::Arc;

use crate::api::*;
use crate::checksum::Checksum;
use crate::cu::{CodingUnit, ReconstructionState, ResidualState};
use crate::def::*;
use crate::enc::bsw::XvceBsw;
use crate::enc::cache::CuCache;
use crate::enc::eco::SyntaxWriter;
use crate::frame::Frame;
use crate::picman::PictureData;
use crate::qp::Qp;
use crate::restrictions::Restrictions;

/* cost/distortion pair returned by every rdo evaluation */
#[derive(Clone, Copy, Debug)]
pub(crate) struct RdoCost {
    pub cost: Cost,
    pub dist: Distortion,
}

impl RdoCost {
    pub fn max() -> Self {
        RdoCost {
            cost: COST_MAX,
            dist: 0,
        }
    }

    pub fn new(cost: Cost, dist: Distortion) -> Self {
        RdoCost { cost, dist }
    }
}

#[inline]
pub(crate) fn xvce_lambda_cost(dist: Distortion, bits: Bits, lambda: f64) -> Cost {
    dist + (bits as f64 * lambda + 0.5) as Cost
}

/******************************************************************************
 * CONTEXT used for the encoding process.
 *****************************************************************************/
pub struct XvceCtx {
    pub(crate) cfg: EncoderConfig,
    pub(crate) settings: EncoderSettings,
    /* picture order count of the next picture */
    poc: u64,
    /* reference pictures, most recent first */
    pub(crate) refs: Vec<Arc<Frame>>,

    /* per-picture state */
    pub(crate) pic_data: PictureData,
    pub(crate) orig_pic: Frame,
    pub(crate) rec_pic: Frame,
    pub(crate) max_pel: pel,

    /* transform engine scratch */
    pub(crate) tx_pred: [Vec<pel>; N_C],
    pub(crate) temp_resi_orig: Vec<i32>,
    pub(crate) temp_resi: Vec<i32>,
    pub(crate) temp_coeff: Vec<i32>,

    pub(crate) cache: CuCache,
    /* one scratch cu per (tree, rdo depth) */
    pub(crate) rdo_temp_cu: Vec<Vec<Option<Box<CodingUnit>>>>,
    /* one reconstruction snapshot per rdo depth */
    pub(crate) temp_cu_state: Vec<ReconstructionState>,
    pub(crate) rd_transform_state: ResidualState,
    pub(crate) rd_intra_state: ResidualState,

    pub(crate) last_ctu_frac_bits: u32,
    pub(crate) prev_ctu_qp: i32,
}

impl XvceCtx {
    pub fn new(cfg: &EncoderConfig, settings: &EncoderSettings) -> Result<Self, XvcError> {
        if cfg.width == 0 || cfg.height == 0
            || cfg.width % (2 * MIN_CU_SIZE) != 0
            || cfg.height % (2 * MIN_CU_SIZE) != 0
        {
            return Err(XvcError::XVC_ERR_INVALID_ARGUMENT);
        }
        if cfg.qp < MIN_ALLOWED_QP || cfg.qp > MAX_ALLOWED_QP {
            return Err(XvcError::XVC_ERR_INVALID_ARGUMENT);
        }
        let cache_enabled = settings.skip_mode_decision_for_identical_cu
            || settings.fast_mode_selection_for_cached_cu
            || settings.fast_merge_eval;
        Ok(XvceCtx {
            cfg: *cfg,
            settings: *settings,
            poc: 0,
            refs: vec![],
            pic_data: PictureData::new(cfg.width, cfg.height, cfg.chroma_format, true, false,
                                       Qp::new(cfg.qp), cfg.adaptive_qp, cfg.chroma_cu_tree,
                                       cfg.max_binary_split_depth),
            orig_pic: Frame::default(),
            rec_pic: Frame::default(),
            max_pel: ((1u32 << cfg.bit_depth) - 1) as pel,
            tx_pred: [
                vec![0; MAX_CU_DIM],
                vec![0; MAX_CU_DIM],
                vec![0; MAX_CU_DIM],
            ],
            temp_resi_orig: vec![0; MAX_CU_DIM],
            temp_resi: vec![0; MAX_CU_DIM],
            temp_coeff: vec![0; MAX_CU_DIM],
            cache: CuCache::new(cache_enabled),
            rdo_temp_cu: vec![],
            temp_cu_state: vec![],
            rd_transform_state: ResidualState::default(),
            rd_intra_state: ResidualState::default(),
            last_ctu_frac_bits: 0,
            prev_ctu_qp: cfg.qp,
        })
    }

    /* segment-level configuration a decoder of this stream needs */
    pub fn segment_header(&self) -> SegmentHeader {
        SegmentHeader {
            soc: 0,
            restrictions: self.cfg.restrictions,
            pic_width: self.cfg.width,
            pic_height: self.cfg.height,
            bitdepth: self.cfg.bit_depth,
            chroma_format: self.cfg.chroma_format,
            checksum_method: self.cfg.checksum_method,
            max_binary_split_depth: self.cfg.max_binary_split_depth,
            adaptive_qp: self.cfg.adaptive_qp,
            chroma_cu_tree: self.cfg.chroma_cu_tree,
        }
    }

    pub fn get_reconstruction(&self) -> &Frame {
        &self.rec_pic
    }

    pub fn encode_pic(&mut self, orig: &Frame) -> Result<Packet, XvcError> {
        if orig.planes[Y_C].width != self.cfg.width || orig.planes[Y_C].height != self.cfg.height {
            return Err(XvcError::XVC_ERR_INVALID_ARGUMENT);
        }
        Restrictions::set_current(self.cfg.restrictions);

        let intra_pic = self.refs.is_empty()
            || self.cfg.intra_period <= 1
            || (self.cfg.intra_period > 0 && self.poc % self.cfg.intra_period == 0);
        let pic_qp = Qp::new(self.cfg.qp);
        self.pic_data = PictureData::new(self.cfg.width, self.cfg.height, self.cfg.chroma_format,
                                         intra_pic, false, pic_qp, self.cfg.adaptive_qp,
                                         self.cfg.chroma_cu_tree, self.cfg.max_binary_split_depth);
        self.orig_pic = orig.clone();
        self.rec_pic = Frame::new(self.cfg.width, self.cfg.height, self.cfg.chroma_format,
                                  self.cfg.bit_depth);
        let cache_enabled = self.settings.skip_mode_decision_for_identical_cu
            || self.settings.fast_mode_selection_for_cached_cu
            || self.settings.fast_merge_eval;
        self.cache = CuCache::new(cache_enabled);
        self.last_ctu_frac_bits = 0;
        self.prev_ctu_qp = self.cfg.qp;

        /* scratch cus for the rdo search, recycled at the end of the picture */
        self.rdo_temp_cu = (0..MAX_NUM_CU_TREES)
            .map(|tree_idx| {
                let tree = if tree_idx == 0 { CuTree::Primary } else { CuTree::Secondary };
                (0..MAX_RDO_DEPTH)
                    .map(|depth| {
                        Some(self.pic_data.create_cu(tree, depth as u8, 0, 0, 0, 0, 0))
                    })
                    .collect()
            })
            .collect();
        self.temp_cu_state = (0..MAX_RDO_DEPTH).map(|_| ReconstructionState::default()).collect();

        let mut bsw = XvceBsw::new();
        bsw.write_ue(self.poc as u32);
        bsw.write1(intra_pic as u32);
        bsw.write(self.cfg.qp as u32, 7);

        for rsaddr in 0..self.pic_data.get_ctu_count() {
            self.pic_data.init_ctu(CuTree::Primary, rsaddr);
            if self.pic_data.has_secondary_cu_tree() {
                self.pic_data.init_ctu(CuTree::Secondary, rsaddr);
            }
            self.encode_ctu(rsaddr, &mut bsw);
        }

        /* scratch cus must go back to the arena after each picture; they are
         * recycled without reference counting */
        let scratch = std::mem::take(&mut self.rdo_temp_cu);
        for per_tree in scratch {
            for slot in per_tree {
                if let Some(cu) = slot {
                    self.pic_data.release_cu_tree(cu);
                }
            }
        }

        bsw.byte_align();
        let mut checksum = Checksum::new(self.cfg.checksum_method);
        checksum.hash_picture(&self.rec_pic);
        bsw.write_bytes(&[self.cfg.checksum_method as u8]);
        bsw.write_bytes(checksum.get_hash());

        self.refs = vec![Arc::new(self.rec_pic.clone())];
        let pts = self.poc;
        self.poc += 1;
        Ok(Packet {
            data: bsw.take_data(),
            pts,
        })
    }
}
