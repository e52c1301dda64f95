use crate::restrictions::Restrictions;

/*****************************************************************************
 * types
 *****************************************************************************/

/* sample type. 16 bits so 8- and 10-bit content share one build */
pub type pel = u16;

pub(crate) type Coeff = i16;
pub(crate) type Distortion = u64;
pub(crate) type Cost = u64;
pub(crate) type Bits = u32;
pub(crate) type SegmentNum = u64;

pub(crate) const DIST_MAX: Distortion = std::u64::MAX;
pub(crate) const COST_MAX: Cost = std::u64::MAX;

pub(crate) const Y_C: usize = 0; /* Y luma */
pub(crate) const U_C: usize = 1; /* Cb chroma */
pub(crate) const V_C: usize = 2; /* Cr chroma */
pub(crate) const N_C: usize = 3; /* number of color components */

pub(crate) const REFP_0: usize = 0;
pub(crate) const REFP_NUM: usize = 2;

/*****************************************************************************
 * CU limits
 *****************************************************************************/
pub(crate) const MAX_CU_LOG2: usize = 6; /* CTU is 64x64 */
pub(crate) const MAX_CU_SIZE: usize = 1 << MAX_CU_LOG2;
pub(crate) const MIN_CU_LOG2: usize = 2;
pub(crate) const MIN_CU_SIZE: usize = 1 << MIN_CU_LOG2;
pub(crate) const MAX_CU_DIM: usize = MAX_CU_SIZE * MAX_CU_SIZE;

/* quad-split depth for the luma tree; chroma may refine one level past it */
pub(crate) const MAX_CU_DEPTH: usize = 3;
pub(crate) const MAX_CU_DEPTH_CHROMA: usize = MAX_CU_DEPTH + 1;

pub(crate) const MAX_BINARY_SPLIT_DEPTH: usize = 3;
pub(crate) const MIN_BINARY_SPLIT_SIZE: usize = 4;

/* deepest rdo recursion: quad depth + binary depth, with margin for the
 * per-leaf inter evaluation slot */
pub(crate) const MAX_RDO_DEPTH: usize = MAX_CU_DEPTH_CHROMA + MAX_BINARY_SPLIT_DEPTH + 2;

pub(crate) const MAX_NUM_CU_TREES: usize = 2;

/*****************************************************************************
 * transform
 *****************************************************************************/
pub(crate) const TRANSFORM_SKIP_MAX_AREA: usize = 4 * 4;
pub(crate) const TRANSFORM_SELECT_MIN_SIG_COEFFS: u32 = 3;
pub(crate) const MAX_TRANSFORM_SELECT_IDX: i8 = 4;

/*****************************************************************************
 * prediction
 *****************************************************************************/
pub(crate) const NUM_INTER_MERGE_CANDIDATES: usize = 5;
pub(crate) const AFFINE_MIN_SIZE: usize = 16;

/*****************************************************************************
 * quant
 *****************************************************************************/
pub(crate) const MIN_ALLOWED_QP: i32 = 0;
pub(crate) const MAX_ALLOWED_QP: i32 = 63;

/* sub-bit precision used by the fractional bit counters */
pub(crate) const FRAC_BITS_SHIFT: u32 = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum YuvComponent {
    Y = 0,
    U = 1,
    V = 2,
}

impl YuvComponent {
    #[inline]
    pub(crate) fn is_luma(self) -> bool {
        self == YuvComponent::Y
    }

    #[inline]
    pub(crate) fn idx(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CuTree {
    Primary = 0,
    Secondary = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SplitType {
    None,
    Quad,
    Horizontal,
    Vertical,
}

impl Default for SplitType {
    fn default() -> Self {
        SplitType::None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SplitRestriction {
    None,
    NoHorizontal,
    NoVertical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PredMode {
    Intra,
    Inter,
}

impl Default for PredMode {
    fn default() -> Self {
        PredMode::Intra
    }
}

/*****************************************************************************
 * intra prediction direction, baseline profile
 *****************************************************************************/
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub(crate) enum IntraPredDir {
    IPD_DC = 0,
    IPD_HOR = 1,
    IPD_VER = 2,
    IPD_UL = 3,
    IPD_UR = 4,
}

pub(crate) const IPD_CNT: usize = 5;

impl Default for IntraPredDir {
    fn default() -> Self {
        IntraPredDir::IPD_DC
    }
}

impl From<u32> for IntraPredDir {
    fn from(val: u32) -> Self {
        use self::IntraPredDir::*;
        match val {
            1 => IPD_HOR,
            2 => IPD_VER,
            3 => IPD_UL,
            4 => IPD_UR,
            _ => IPD_DC,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Mv {
    pub x: i16,
    pub y: i16,
}

impl Mv {
    pub(crate) const ZERO: Mv = Mv { x: 0, y: 0 };

    pub(crate) fn new(x: i16, y: i16) -> Self {
        Mv { x, y }
    }

    /* quarter-pel mv rounded to the nearest full-pel position */
    pub(crate) fn round_to_fullpel(self) -> Mv {
        Mv {
            x: ((self.x + 2) >> 2) << 2,
            y: ((self.y + 2) >> 2) << 2,
        }
    }
}

/*****************************************************************************
 * segment header
 *****************************************************************************/
#[derive(Clone, Debug)]
pub struct SegmentHeader {
    /* sequence order counter of this coded segment */
    pub soc: SegmentNum,
    pub restrictions: Restrictions,
    pub pic_width: usize,
    pub pic_height: usize,
    pub bitdepth: u32,
    pub chroma_format: ChromaFormat,
    pub checksum_method: crate::checksum::ChecksumMethod,
    pub max_binary_split_depth: u8,
    /* 0: off, 1: variance based, 2: signaled against prediction */
    pub adaptive_qp: u8,
    /* separate chroma cu tree in intra pictures */
    pub chroma_cu_tree: bool,
}

impl Default for SegmentHeader {
    fn default() -> Self {
        SegmentHeader {
            soc: 0,
            restrictions: Restrictions::default(),
            pic_width: 0,
            pic_height: 0,
            bitdepth: 8,
            chroma_format: ChromaFormat::CF_420,
            checksum_method: crate::checksum::ChecksumMethod::Md5,
            max_binary_split_depth: MAX_BINARY_SPLIT_DEPTH as u8,
            adaptive_qp: 0,
            chroma_cu_tree: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum ChromaFormat {
    CF_MONO = 0,
    CF_420 = 1,
}

impl Default for ChromaFormat {
    fn default() -> Self {
        ChromaFormat::CF_420
    }
}

/* largest transform the current restriction set allows */
#[inline]
pub(crate) fn xvc_max_tr_size(restrictions: &Restrictions) -> usize {
    if !restrictions.disable_ext_transform_size_64 {
        64
    } else {
        32
    }
}
