pub(crate) mod bsr;
pub(crate) mod eco;
pub mod thd;

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::*;

use crate::api::XvcError;
use crate::checksum::{Checksum, ChecksumMethod};
use crate::cu::CodingUnit;
use crate::dec::bsr::XvcdBsr;
use crate::dec::eco::*;
use crate::def::*;
use crate::frame::Frame;
use crate::ipred::*;
use crate::itdq::*;
use crate::mc::*;
use crate::picman::PictureData;
use crate::qp::Qp;
use crate::restrictions::Restrictions;
use crate::util::*;

/* Per-picture lifecycle inside the decoder pipeline. Stored as an atomic
 * word with acquire/release ordering so workers can test dependency
 * readiness without the pool mutex. */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputStatus {
    Processing = 0,
    PostProcessing = 1,
    FinishedProcessing = 2,
    HasNotBeenOutput = 3,
}

impl OutputStatus {
    fn from_u32(v: u32) -> OutputStatus {
        match v {
            0 => OutputStatus::Processing,
            1 => OutputStatus::PostProcessing,
            2 => OutputStatus::FinishedProcessing,
            _ => OutputStatus::HasNotBeenOutput,
        }
    }
}

struct PicDecState {
    /* where the checksum tail starts, relative to the nal start */
    tail_offset: usize,
}

/* Decodes one picture and verifies its embedded checksum. The
 * reconstruction is published before the Processing -> PostProcessing
 * transition, so dependent pictures can read it lock-free. */
pub struct PictureDecoder {
    state: Mutex<PicDecState>,
    recon: Mutex<Option<Arc<Frame>>>,
    output_status: AtomicU32,
    poc: AtomicU64,
}

impl Default for PictureDecoder {
    fn default() -> Self {
        PictureDecoder::new()
    }
}

impl PictureDecoder {
    pub fn new() -> Self {
        PictureDecoder {
            state: Mutex::new(PicDecState { tail_offset: 0 }),
            recon: Mutex::new(None),
            output_status: AtomicU32::new(OutputStatus::Processing as u32),
            poc: AtomicU64::new(0),
        }
    }

    pub fn get_output_status(&self) -> OutputStatus {
        OutputStatus::from_u32(self.output_status.load(Ordering::Acquire))
    }

    pub fn set_output_status(&self, status: OutputStatus) {
        self.output_status.store(status as u32, Ordering::Release);
    }

    pub fn get_poc(&self) -> u64 {
        self.poc.load(Ordering::Acquire)
    }

    pub fn get_reconstruction(&self) -> Option<Arc<Frame>> {
        self.recon.lock().unwrap().clone()
    }

    /* parse and reconstruct one picture nal */
    pub fn decode(&self, segment_header: &SegmentHeader, _prev_segment_header: &SegmentHeader,
                  nal: &[u8], nal_offset: usize, refs: &[Arc<Frame>]) -> bool {
        let result = self.decode_internal(segment_header, nal, nal_offset, refs);
        match result {
            Ok(()) => true,
            Err(err) => {
                warn!("picture decode failed: {}", err);
                false
            }
        }
    }

    fn decode_internal(&self, segment: &SegmentHeader, nal: &[u8], nal_offset: usize,
                       refs: &[Arc<Frame>]) -> Result<(), XvcError> {
        let payload = nal.get(nal_offset..).ok_or(XvcError::XVC_ERR_INVALID_ARGUMENT)?;
        let mut bsr = XvcdBsr::new(payload);

        let poc = bsr.read_ue()? as u64;
        let intra_pic = bsr.read1()? == 1;
        let pic_qp_raw = bsr.read(7)? as i32;
        if pic_qp_raw > MAX_ALLOWED_QP {
            return Err(XvcError::XVC_ERR_MALFORMED_BITSTREAM);
        }
        if !intra_pic && refs.is_empty() {
            return Err(XvcError::XVC_ERR_MALFORMED_BITSTREAM);
        }
        self.poc.store(poc, Ordering::Release);

        let mut pic_data = PictureData::new(segment.pic_width, segment.pic_height,
                                            segment.chroma_format, intra_pic, false,
                                            Qp::new(pic_qp_raw), segment.adaptive_qp,
                                            segment.chroma_cu_tree,
                                            segment.max_binary_split_depth);
        let mut frame = Frame::new(segment.pic_width, segment.pic_height, segment.chroma_format,
                                   segment.bitdepth);
        let max_pel = ((1u32 << segment.bitdepth) - 1) as pel;
        let restrictions = Restrictions::get();
        let mut prev_ctu_qp = pic_qp_raw;

        let result = (|| -> Result<(), XvcError> {
            for rsaddr in 0..pic_data.get_ctu_count() {
                /* phase one: parse the whole ctu, qp comes after the tree */
                pic_data.init_ctu(CuTree::Primary, rsaddr);
                let mut ctu = pic_data.take_ctu(CuTree::Primary, rsaddr).unwrap();
                let mut any_cbf = xvcd_eco_ctu(&mut bsr, &mut ctu, &mut pic_data)?;
                let mut ctu2 = if pic_data.has_secondary_cu_tree() {
                    pic_data.init_ctu(CuTree::Secondary, rsaddr);
                    let mut ctu2 = pic_data.take_ctu(CuTree::Secondary, rsaddr).unwrap();
                    any_cbf |= xvcd_eco_ctu(&mut bsr, &mut ctu2, &mut pic_data)?;
                    Some(ctu2)
                } else {
                    None
                };

                let ctu_qp_raw = if segment.adaptive_qp > 0 {
                    if any_cbf {
                        let qp = xvcd_eco_qp(&mut bsr, prev_ctu_qp)?;
                        if qp < MIN_ALLOWED_QP || qp > MAX_ALLOWED_QP {
                            return Err(XvcError::XVC_ERR_MALFORMED_BITSTREAM);
                        }
                        prev_ctu_qp = qp;
                        qp
                    } else {
                        let derived = if segment.adaptive_qp == 2 {
                            prev_ctu_qp
                        } else {
                            pic_qp_raw
                        };
                        prev_ctu_qp = derived;
                        derived
                    }
                } else {
                    pic_qp_raw
                };
                if restrictions.disable_ext_implicit_last_ctu {
                    let _ = bsr.read1()?;
                }

                /* phase two: reconstruct in coding order */
                let qp = Qp::new(ctu_qp_raw);
                set_qp_recursive(&mut ctu, qp);
                self.recon_cu(&mut ctu, &mut pic_data, &mut frame, refs, max_pel)?;
                pic_data.set_ctu(CuTree::Primary, rsaddr, ctu);
                if let Some(ref mut ctu2) = ctu2 {
                    set_qp_recursive(ctu2, qp);
                    self.recon_cu(ctu2, &mut pic_data, &mut frame, refs, max_pel)?;
                }
                if let Some(ctu2) = ctu2 {
                    pic_data.set_ctu(CuTree::Secondary, rsaddr, ctu2);
                }
            }
            bsr.byte_align();
            Ok(())
        })();

        /* publish whatever was reconstructed, then report the error; a
         * corrupt reference is still a reference for downstream pictures */
        self.state.lock().unwrap().tail_offset = nal_offset + bsr.get_read_bytes();
        *self.recon.lock().unwrap() = Some(Arc::new(frame));
        result
    }

    /* verify the embedded checksum against the reconstruction */
    pub fn postprocess(&self, segment_header: &SegmentHeader, nal: &[u8]) -> bool {
        let tail_offset = self.state.lock().unwrap().tail_offset;
        let recon = match self.get_reconstruction() {
            Some(recon) => recon,
            None => return false,
        };
        let tail = match nal.get(tail_offset..) {
            Some(tail) => tail,
            None => return false,
        };
        if tail.is_empty() {
            return false;
        }
        let method = match ChecksumMethod::from_u8(tail[0]) {
            Some(method) => method,
            None => return false,
        };
        if method != segment_header.checksum_method {
            return false;
        }
        let hash_size = method.hash_size();
        if tail.len() < 1 + hash_size {
            return false;
        }
        let signaled = Checksum::from_hash(method, tail[1..1 + hash_size].to_vec());
        let mut computed = Checksum::new(method);
        computed.hash_picture(&recon);
        if computed != signaled {
            debug!("picture checksum mismatch at poc {}", self.get_poc());
            return false;
        }
        true
    }

    /*************************************************************************
     * reconstruction
     *************************************************************************/

    fn recon_cu(&self, cu: &mut CodingUnit, pic_data: &mut PictureData, frame: &mut Frame,
                refs: &[Arc<Frame>], max_pel: pel) -> Result<(), XvcError> {
        if cu.get_split() != SplitType::None {
            for i in 0..4 {
                if let Some(mut sub_cu) = cu.sub_cu[i].take() {
                    self.recon_cu(&mut sub_cu, pic_data, frame, refs, max_pel)?;
                    cu.sub_cu[i] = Some(sub_cu);
                }
            }
            return Ok(());
        }

        if cu.is_inter() {
            resolve_inter_params(cu, pic_data)?;
            if cu.pred.refi[REFP_0] as usize >= refs.len() {
                return Err(XvcError::XVC_ERR_MALFORMED_BITSTREAM);
            }
        }

        let components = {
            let list = pic_data.get_components(cu.get_cu_tree());
            let mut comps = [YuvComponent::Y; 3];
            comps[..list.len()].copy_from_slice(list);
            (comps, list.len())
        };
        let qp = cu.get_qp();
        let mut pred = vec![0 as pel; MAX_CU_DIM];
        let mut coef = vec![0i32; MAX_CU_DIM];
        let mut resi = vec![0i32; MAX_CU_DIM];
        for &comp in components.0[..components.1].iter() {
            let c = comp.idx();
            let x = cu.get_pos_x(comp);
            let y = cu.get_pos_y(comp);
            let w = cu.get_width(comp);
            let h = cu.get_height(comp);

            /* prediction */
            if cu.is_intra() {
                let nbr = xvc_get_nbr(pic_data, frame, cu.get_cu_tree(), comp,
                                      cu.get_pos_x(YuvComponent::Y),
                                      cu.get_pos_y(YuvComponent::Y),
                                      cu.get_width(YuvComponent::Y),
                                      cu.get_height(YuvComponent::Y));
                xvc_ipred(&nbr, &mut pred, cu.pred.intra_dir[0], w, h);
            } else {
                let refp = &refs[cu.pred.refi[REFP_0] as usize];
                if cu.pred.affine {
                    let (v0, v1) = (cu.pred.mv[0], cu.pred.mv[1]);
                    if comp.is_luma() {
                        xvc_mc_affine_luma(&refp.planes[c], x, y, v0, v1, w, h, &mut pred);
                    } else {
                        xvc_mc_affine_chroma(&refp.planes[c], x, y, v0, v1, w, h, &mut pred);
                    }
                } else {
                    let mv = cu.pred.mv[REFP_0];
                    if comp.is_luma() {
                        xvc_mc_luma(&refp.planes[c], x, y, mv, w, h, &mut pred);
                    } else {
                        xvc_mc_chroma(&refp.planes[c], x, y, mv, w, h, &mut pred);
                    }
                }
                if cu.pred.lic {
                    let frac_log2 = if comp.is_luma() { 2 } else { 3 };
                    let offset = xvc_lic_offset(&frame.planes[c], &refp.planes[c], x, y,
                                                cu.pred.mv[REFP_0], frac_log2, w, h);
                    xvc_apply_lic(&mut pred[..w * h], offset, max_pel);
                }
            }

            /* residual and write-out */
            if cu.get_cbf(comp) {
                let tx_select_idx = if comp.is_luma() { cu.get_transform_select_idx() } else { -1 };
                xvc_dequant(&qp, comp, cu.get_coeff(comp), &mut coef);
                xvc_inv_transform(&coef, &mut resi, w, h, tx_select_idx,
                                  cu.get_transform_skip(comp));
                for j in 0..h {
                    let row = &mut frame.planes[c].row_mut(y + j)[x..x + w];
                    for i in 0..w {
                        row[i] = XVC_CLIP3(0, max_pel as i32,
                                           pred[j * w + i] as i32 + resi[j * w + i]) as pel;
                    }
                }
            } else {
                frame.write_block(c, x, y, w, h, &pred[..w * h]);
            }
        }
        pic_data.mark_used_in_pic(cu);
        Ok(())
    }
}

/* merge lists and affine parameters are derived against the map state at
 * reconstruction time, matching what the encoder saw during its search */
fn resolve_inter_params(cu: &mut CodingUnit, pic_data: &PictureData) -> Result<(), XvcError> {
    if cu.pred.merge_flag {
        if cu.pred.affine {
            let (v0, v1) = pic_data.get_affine_merge_cand(cu);
            cu.pred.mv[0] = v0;
            cu.pred.mv[1] = v1;
            cu.pred.refi[REFP_0] = 0;
        } else {
            let cand = pic_data.get_merge_candidates(cu)[cu.pred.merge_idx.max(0) as usize];
            cu.pred.mv[REFP_0] = cand.mv;
            cu.pred.refi[REFP_0] = cand.refi;
        }
    } else {
        let mvp = pic_data.get_merge_candidates(cu)[0].mv;
        let mvd = cu.pred.mvd[REFP_0];
        cu.pred.mv[REFP_0] = if cu.pred.fullpel_mv {
            let base = mvp.round_to_fullpel();
            Mv::new(base.x + (mvd.x << 2), base.y + (mvd.y << 2))
        } else {
            Mv::new(mvp.x + mvd.x, mvp.y + mvd.y)
        };
        cu.pred.refi[REFP_0] = 0;
    }
    Ok(())
}

fn set_qp_recursive(cu: &mut CodingUnit, qp: Qp) {
    cu.set_qp(qp);
    for sub in cu.sub_cu.iter_mut() {
        if let Some(sub) = sub.as_deref_mut() {
            set_qp_recursive(sub, qp);
        }
    }
}
