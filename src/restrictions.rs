use std::cell::Cell;

/* Syntactic restrictions active for one coded segment. Every flag removes a
 * tool from the bitstream; the default segment has everything enabled.
 *
 * The active set is broadcast through a thread-local slot. Decoder workers
 * refresh the slot before touching any picture of a new segment (keyed by
 * soc); the encoder sets it once per picture before the CTU loop. */
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Restrictions {
    pub disable_ext_transform_size_64: bool,
    pub disable_ext_transform_select: bool,
    pub disable_ext_implicit_partition_type: bool,
    pub disable_ext_implicit_last_ctu: bool,
    pub disable_transform_skip: bool,
    pub disable_transform_cbf: bool,
    pub disable_inter_merge_mode: bool,
    pub disable_inter_merge_candidates: bool,
    pub disable_inter_skip_mode: bool,
    pub disable_ext2_inter_affine: bool,
    pub disable_ext2_inter_affine_merge: bool,
    pub disable_ext2_inter_local_illumination_comp: bool,
    pub disable_ext2_inter_adaptive_fullpel_mv: bool,
}

thread_local! {
    static CURRENT: Cell<Restrictions> = Cell::new(Restrictions::default());
}

impl Restrictions {
    /* snapshot of the thread's active restriction set */
    pub fn get() -> Restrictions {
        CURRENT.with(|c| c.get())
    }

    pub fn set_current(restrictions: Restrictions) {
        CURRENT.with(|c| c.set(restrictions));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_local_slot() {
        let mut r = Restrictions::default();
        r.disable_transform_skip = true;
        Restrictions::set_current(r);
        assert!(Restrictions::get().disable_transform_skip);

        /* another thread starts from the default set */
        std::thread::spawn(|| {
            assert!(!Restrictions::get().disable_transform_skip);
        })
        .join()
        .unwrap();

        Restrictions::set_current(Restrictions::default());
    }
}
