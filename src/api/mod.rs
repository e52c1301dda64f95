use std::fmt;

pub use crate::checksum::ChecksumMethod;
pub use crate::def::{ChromaFormat, SegmentHeader};
pub use crate::restrictions::Restrictions;

/*****************************************************************************
 * return values and error code
 *****************************************************************************/
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum XvcError {
    /* not matched picture checksum */
    XVC_ERR_BAD_CHECKSUM = 201,

    XVC_ERR = -1, /* generic error */
    XVC_ERR_INVALID_ARGUMENT = -101,
    XVC_ERR_UNSUPPORTED = -104,
    XVC_ERR_MALFORMED_BITSTREAM = -202,
}

impl fmt::Display for XvcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::XvcError::*;
        match self {
            XVC_ERR_BAD_CHECKSUM => write!(f, "picture checksum mismatch"),
            XVC_ERR => write!(f, "generic error"),
            XVC_ERR_INVALID_ARGUMENT => write!(f, "invalid argument"),
            XVC_ERR_UNSUPPORTED => write!(f, "unsupported"),
            XVC_ERR_MALFORMED_BITSTREAM => write!(f, "malformed bitstream"),
        }
    }
}

/* one encoded picture */
#[derive(Default)]
pub struct Packet {
    pub data: Vec<u8>,
    pub pts: u64,
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Packet {} - {} bytes", self.pts, self.data.len())
    }
}

/* Encoder settings which impact the produced bitstream. */
#[derive(Clone, Copy, Debug)]
pub struct EncoderConfig {
    /* Width of the frames in pixels. */
    pub width: usize,
    /* Height of the frames in pixels. */
    pub height: usize,
    /* Bit depth. */
    pub bit_depth: u32,
    /* Chroma subsampling. */
    pub chroma_format: ChromaFormat,
    /* The base quantizer to use. */
    pub qp: i32,
    /* Interval between intra pictures (1 = all intra). */
    pub intra_period: u64,
    /* Reconstructed-picture hash embedded per picture. */
    pub checksum_method: ChecksumMethod,
    /* Deepest allowed binary split. */
    pub max_binary_split_depth: u8,
    /* 0: off, 1: variance based, 2: signaled against prediction. */
    pub adaptive_qp: u8,
    /* Separate chroma cu tree in intra pictures. */
    pub chroma_cu_tree: bool,
    pub restrictions: Restrictions,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            width: 0,
            height: 0,
            bit_depth: 8,
            chroma_format: ChromaFormat::CF_420,
            qp: 32,
            intra_period: 32,
            checksum_method: ChecksumMethod::Md5,
            max_binary_split_depth: 2,
            adaptive_qp: 0,
            chroma_cu_tree: false,
            restrictions: Restrictions::default(),
        }
    }
}

/* Settings which affect the encoding speed vs. quality trade-off and the
 * bit accounting discipline of the rdo search. These do not change what a
 * decoder must support. */
#[derive(Clone, Copy, Debug)]
pub struct EncoderSettings {
    /* split-syntax bits are counted before descending, and the speculative
     * writer must agree with the real writer after every ctu */
    pub strict_rdo_bit_counting: bool,
    /* rdo bit counters restart from the actually written bits per ctu */
    pub count_actual_written_bits: bool,

    /* adaptive qp strength in tenths, active when the stream uses it */
    pub aqp_strength: i32,

    /* speed-ups; none of them change conformance */
    pub fast_cu_split_based_on_full_cu: bool,
    pub fast_quad_split_based_on_binary_split: i32,
    pub skip_mode_decision_for_identical_cu: bool,
    pub fast_mode_selection_for_cached_cu: bool,
    pub fast_merge_eval: bool,
    pub always_evaluate_intra_in_inter: bool,
    pub fast_inter_transform_dist: bool,
    pub fast_inter_root_cbf_zero_bits: bool,
    pub bias_transform_select_cost: bool,
    pub rdo_quant: bool,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        EncoderSettings {
            strict_rdo_bit_counting: true,
            count_actual_written_bits: true,
            aqp_strength: 10,
            fast_cu_split_based_on_full_cu: true,
            fast_quad_split_based_on_binary_split: 1,
            skip_mode_decision_for_identical_cu: true,
            fast_mode_selection_for_cached_cu: true,
            fast_merge_eval: true,
            always_evaluate_intra_in_inter: false,
            fast_inter_transform_dist: false,
            fast_inter_root_cbf_zero_bits: true,
            bias_transform_select_cost: true,
            rdo_quant: true,
        }
    }
}

impl EncoderSettings {
    /* everything evaluated, nothing pruned */
    pub fn placebo() -> Self {
        EncoderSettings {
            fast_cu_split_based_on_full_cu: false,
            fast_quad_split_based_on_binary_split: 0,
            skip_mode_decision_for_identical_cu: false,
            fast_mode_selection_for_cached_cu: false,
            fast_merge_eval: false,
            always_evaluate_intra_in_inter: true,
            ..Default::default()
        }
    }
}
