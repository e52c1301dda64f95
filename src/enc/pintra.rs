use crate::cu::CodingUnit;
use crate::def::*;
use crate::enc::eco::*;
use crate::enc::sad::*;
use crate::enc::*;
use crate::ipred::*;
use crate::qp::Qp;

/*****************************************************************************
 * intra prediction analysis
 *****************************************************************************/

const IPD_RDO_LIST: [IntraPredDir; IPD_CNT] = [
    IntraPredDir::IPD_DC,
    IntraPredDir::IPD_HOR,
    IntraPredDir::IPD_VER,
    IntraPredDir::IPD_UL,
    IntraPredDir::IPD_UR,
];

impl XvceCtx {
    pub(crate) fn predict_intra_comp(&mut self, cu: &CodingUnit, comp: YuvComponent) {
        let lx = cu.get_pos_x(YuvComponent::Y);
        let ly = cu.get_pos_y(YuvComponent::Y);
        let lw = cu.get_width(YuvComponent::Y);
        let lh = cu.get_height(YuvComponent::Y);
        let nbr = xvc_get_nbr(&self.pic_data, &self.rec_pic, cu.get_cu_tree(), comp, lx, ly, lw,
                              lh);
        xvc_ipred(&nbr, &mut self.tx_pred[comp.idx()], cu.pred.intra_dir[0],
                  cu.get_width(comp), cu.get_height(comp));
    }

    /* full mode search on luma, rd cost through the transform engine */
    pub(crate) fn compress_intra_luma(&mut self, cu: &mut CodingUnit, qp: &Qp) -> Distortion {
        let comp = YuvComponent::Y;
        let comps = [YuvComponent::Y];
        let x = cu.get_pos_x(comp);
        let y = cu.get_pos_y(comp);
        let w = cu.get_width(comp);
        let h = cu.get_height(comp);

        let mut best_state = std::mem::take(&mut self.rd_intra_state);
        let mut best_cost = COST_MAX;
        let mut best_dist = 0;
        let mut best_dir = IntraPredDir::IPD_DC;
        for &dir in IPD_RDO_LIST.iter() {
            cu.pred.intra_dir = [dir; 2];
            self.predict_intra_comp(cu, comp);
            let dist_zero = xvce_ssd(&self.orig_pic.planes[Y_C], x, y, &self.tx_pred[Y_C][..w * h],
                                     w, h);
            let mut dist = self.compress_and_eval_transform(cu, comp, qp);
            if cu.get_cbf(comp) && self.eval_cbf_zero(cu, qp, comp, dist, dist_zero) {
                self.rec_pic.write_block(Y_C, x, y, w, h, &self.tx_pred[Y_C][..w * h]);
                dist = dist_zero;
            }
            let mut rdo_writer = RdoSyntaxWriter::new(0, 0);
            xvce_eco_unit(cu, comp, &self.pic_data, &mut rdo_writer);
            let cost = xvce_lambda_cost(dist, rdo_writer.get_num_written_bits(), qp.get_lambda());
            if cost < best_cost {
                best_cost = cost;
                best_dist = dist;
                best_dir = dir;
                cu.save_residual_state_to(&mut best_state, &self.rec_pic, &comps);
            }
        }
        cu.pred.intra_dir = [best_dir; 2];
        cu.load_residual_state_from(&best_state, &mut self.rec_pic, &comps);
        self.rd_intra_state = best_state;
        best_dist
    }

    /* chroma follows the luma direction */
    pub(crate) fn compress_intra_chroma(&mut self, cu: &mut CodingUnit, qp: &Qp) -> Distortion {
        let mut dist = 0;
        for &comp in [YuvComponent::U, YuvComponent::V].iter() {
            dist += self.compress_intra_comp_fixed_dir(cu, comp, qp);
        }
        dist
    }

    /* mode search for a chroma-only (secondary tree) cu, luma-style but
     * costing both components together */
    pub(crate) fn compress_intra_chroma_tree(&mut self, cu: &mut CodingUnit, qp: &Qp)
                                             -> Distortion {
        let comps = [YuvComponent::U, YuvComponent::V];
        let mut best_state = std::mem::take(&mut self.rd_intra_state);
        let mut best_cost = COST_MAX;
        let mut best_dist = 0;
        let mut best_dir = IntraPredDir::IPD_DC;
        for &dir in IPD_RDO_LIST.iter() {
            cu.pred.intra_dir = [dir; 2];
            let mut dist = 0;
            for &comp in comps.iter() {
                dist += self.compress_intra_comp_fixed_dir(cu, comp, qp);
            }
            let mut rdo_writer = RdoSyntaxWriter::new(0, 0);
            for &comp in comps.iter() {
                xvce_eco_unit(cu, comp, &self.pic_data, &mut rdo_writer);
            }
            let cost = xvce_lambda_cost(dist, rdo_writer.get_num_written_bits(), qp.get_lambda());
            if cost < best_cost {
                best_cost = cost;
                best_dist = dist;
                best_dir = dir;
                cu.save_residual_state_to(&mut best_state, &self.rec_pic, &comps);
            }
        }
        cu.pred.intra_dir = [best_dir; 2];
        cu.load_residual_state_from(&best_state, &mut self.rec_pic, &comps);
        self.rd_intra_state = best_state;
        best_dist
    }

    /* prediction with the cu's direction, residual decisions re-derived */
    pub(crate) fn compress_intra_comp_fixed_dir(&mut self, cu: &mut CodingUnit,
                                                comp: YuvComponent, qp: &Qp) -> Distortion {
        let c = comp.idx();
        let x = cu.get_pos_x(comp);
        let y = cu.get_pos_y(comp);
        let w = cu.get_width(comp);
        let h = cu.get_height(comp);
        self.predict_intra_comp(cu, comp);
        let dist_zero = xvce_ssd(&self.orig_pic.planes[c], x, y, &self.tx_pred[c][..w * h], w, h);
        let dist = self.compress_and_eval_transform(cu, comp, qp);
        if cu.get_cbf(comp) && self.eval_cbf_zero(cu, qp, comp, dist, dist_zero) {
            self.rec_pic.write_block(c, x, y, w, h, &self.tx_pred[c][..w * h]);
            return dist_zero;
        }
        dist
    }
}
