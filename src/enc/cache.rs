use crate::cu::{CodingUnit, PredictionState};
use crate::def::*;

/* Memoized prediction decisions, keyed by (tree, depth, position, size).
 * Lets later children of a quad split reuse what was learned when an
 * identical block was evaluated inside an earlier candidate partition.
 * Purely an encoder speed-up: dropping it changes nothing but runtime. */

#[derive(Clone, Debug)]
struct CacheEntry {
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    pred: PredictionState,
    any_intra: bool,
    any_skip: bool,
    any_inter: bool,
}

#[derive(Default)]
pub(crate) struct CacheResult {
    pub cu: Option<PredictionState>,
    pub cacheable: bool,
    pub any_intra: bool,
    pub any_skip: bool,
    pub any_inter: bool,
}

pub(crate) struct CuCache {
    levels: Vec<Vec<CacheEntry>>,
    enabled: bool,
}

const CACHE_DEPTHS: usize = MAX_CU_DEPTH_CHROMA + 1;

impl CuCache {
    pub fn new(enabled: bool) -> Self {
        CuCache {
            levels: (0..MAX_NUM_CU_TREES * CACHE_DEPTHS).map(|_| vec![]).collect(),
            enabled,
        }
    }

    #[inline]
    fn level(tree: CuTree, depth: u8) -> usize {
        tree as usize * CACHE_DEPTHS + depth as usize
    }

    /* wipe stale entries when a new quad at this level is entered */
    pub fn invalidate(&mut self, tree: CuTree, depth: u8) {
        if (depth as usize) < CACHE_DEPTHS {
            self.levels[Self::level(tree, depth)].clear();
        }
    }

    pub fn lookup(&self, cu: &CodingUnit) -> CacheResult {
        let mut result = CacheResult {
            cacheable: self.enabled,
            ..Default::default()
        };
        if !self.enabled {
            return result;
        }
        let level = &self.levels[Self::level(cu.get_cu_tree(), cu.get_depth())];
        let x = cu.get_pos_x(YuvComponent::Y);
        let y = cu.get_pos_y(YuvComponent::Y);
        let w = cu.get_width(YuvComponent::Y);
        let h = cu.get_height(YuvComponent::Y);
        for entry in level.iter() {
            if entry.x == x && entry.y == y && entry.width == w && entry.height == h {
                result.cu = Some(entry.pred.clone());
                result.any_intra = entry.any_intra;
                result.any_skip = entry.any_skip;
                result.any_inter = entry.any_inter;
                break;
            }
        }
        result
    }

    pub fn store(&mut self, cu: &CodingUnit) {
        if !self.enabled {
            return;
        }
        let idx = Self::level(cu.get_cu_tree(), cu.get_depth());
        let x = cu.get_pos_x(YuvComponent::Y);
        let y = cu.get_pos_y(YuvComponent::Y);
        let w = cu.get_width(YuvComponent::Y);
        let h = cu.get_height(YuvComponent::Y);
        let is_intra = cu.is_intra();
        let is_skip = cu.get_skip_flag();
        let level = &mut self.levels[idx];
        for entry in level.iter_mut() {
            if entry.x == x && entry.y == y && entry.width == w && entry.height == h {
                entry.pred = cu.pred.clone();
                entry.any_intra |= is_intra;
                entry.any_skip |= is_skip;
                entry.any_inter |= !is_intra && !is_skip;
                return;
            }
        }
        level.push(CacheEntry {
            x,
            y,
            width: w,
            height: h,
            pred: cu.pred.clone(),
            any_intra: is_intra,
            any_skip: is_skip,
            any_inter: !is_intra && !is_skip,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_cu(x: usize, y: usize, size: usize, depth: u8) -> CodingUnit {
        let mut cu = CodingUnit::default();
        cu.init(CuTree::Primary, depth, 0, x, y, size, size, 1);
        cu
    }

    #[test]
    fn store_then_lookup() {
        let mut cache = CuCache::new(true);
        let mut cu = leaf_cu(16, 16, 16, 2);
        cu.set_pred_mode(PredMode::Inter);
        cu.set_skip_flag(true);
        cache.store(&cu);
        let result = cache.lookup(&cu);
        assert!(result.cu.is_some());
        assert!(result.any_skip);
        assert!(!result.any_intra);
    }

    #[test]
    fn flags_accumulate_across_stores() {
        let mut cache = CuCache::new(true);
        let mut cu = leaf_cu(0, 0, 16, 2);
        cu.set_pred_mode(PredMode::Intra);
        cache.store(&cu);
        cu.set_pred_mode(PredMode::Inter);
        cache.store(&cu);
        let result = cache.lookup(&cu);
        assert!(result.any_intra);
        assert!(result.any_inter);
    }

    #[test]
    fn invalidate_clears_level() {
        let mut cache = CuCache::new(true);
        let cu = leaf_cu(0, 0, 16, 2);
        cache.store(&cu);
        cache.invalidate(CuTree::Primary, 2);
        assert!(cache.lookup(&cu).cu.is_none());
    }

    #[test]
    fn disabled_cache_is_inert() {
        let mut cache = CuCache::new(false);
        let cu = leaf_cu(0, 0, 16, 2);
        cache.store(&cu);
        let result = cache.lookup(&cu);
        assert!(result.cu.is_none());
        assert!(!result.cacheable);
    }
}
