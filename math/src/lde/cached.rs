use crate::errors::MathError;
use crate::field::element::FftField;
use crate::field::{BaseFieldElement, FieldElement};
use crate::lde::LdeManager;

/// A wrapper over [`LdeManager`] that memoizes whole-coset evaluations and
/// serves point queries out of the cache.
///
/// A cache entry holds one vector per column, each the size of the trace
/// domain; entry indices are (coset index, column index, point index).
pub struct CachedLdeManager<T> {
    /// Dropped by `finalize_evaluations`, after which only cached data is
    /// reachable.
    lde_manager: Option<LdeManager<T>>,
    coset_offsets: Vec<BaseFieldElement>,
    domain_size: u64,
    n_columns: usize,
    done_adding: bool,
    cache: Vec<Option<Vec<Vec<T>>>>,
}

impl<T: FftField> CachedLdeManager<T> {
    pub fn new(
        lde_manager: LdeManager<T>,
        coset_offsets: Vec<BaseFieldElement>,
    ) -> Result<Self, MathError> {
        assert!(
            !coset_offsets.is_empty(),
            "at least one coset offset is required"
        );
        let domain_size = lde_manager.domain_size();
        let cache = coset_offsets.iter().map(|_| None).collect();
        Ok(Self {
            lde_manager: Some(lde_manager),
            coset_offsets,
            domain_size,
            n_columns: 0,
            done_adding: false,
            cache,
        })
    }

    fn inner(&self) -> &LdeManager<T> {
        self.lde_manager
            .as_ref()
            .expect("uncached evaluations are forbidden after finalize_evaluations")
    }

    pub fn add_evaluation(&mut self, evaluation: Vec<T>) -> Result<(), MathError> {
        assert!(!self.done_adding, "cannot add columns after finalize_adding");
        self.lde_manager
            .as_mut()
            .expect("uncached evaluations are forbidden after finalize_evaluations")
            .add_evaluation(evaluation)?;
        self.n_columns += 1;
        Ok(())
    }

    /// Indicates that no further columns will be added.
    pub fn finalize_adding(&mut self) {
        self.done_adding = true;
    }

    pub fn num_columns(&self) -> usize {
        assert!(
            self.done_adding,
            "num_columns must be called after finalize_adding"
        );
        self.n_columns
    }

    pub fn num_cosets(&self) -> usize {
        self.coset_offsets.len()
    }

    pub fn domain_size(&self) -> u64 {
        self.domain_size
    }

    /// Returns (computing and caching on first use) the evaluation of every
    /// column over the coset with the given index.
    pub fn eval_on_coset(&mut self, coset_index: u64) -> Result<&Vec<Vec<T>>, MathError> {
        let index = coset_index as usize;
        assert!(index < self.coset_offsets.len(), "coset index out of range");
        if self.cache[index].is_none() {
            let offset = self.coset_offsets[index];
            let entry = self.inner().eval_on_coset(&offset)?;
            self.cache[index] = Some(entry);
        }
        Ok(self.cache[index].as_ref().unwrap())
    }

    /// Serves batched point queries from the cache. Every queried coset must
    /// already be cached. `outputs` holds one vector per column, each of the
    /// same length as `coset_and_point_indices`.
    pub fn eval_at_points(
        &self,
        coset_and_point_indices: &[(u64, u64)],
        outputs: &mut [Vec<T>],
    ) -> Result<(), MathError> {
        assert_eq!(outputs.len(), self.n_columns, "one output span per column");
        for output in outputs.iter() {
            assert_eq!(
                output.len(),
                coset_and_point_indices.len(),
                "one output slot per query"
            );
        }
        for (query_index, (coset_index, point_index)) in
            coset_and_point_indices.iter().enumerate()
        {
            let entry = self.cache[*coset_index as usize]
                .as_ref()
                .expect("queried coset is not cached");
            for (column, output) in outputs.iter_mut().enumerate() {
                output[query_index] = entry[column][*point_index as usize];
            }
        }
        Ok(())
    }

    /// Evaluates a column at arbitrary points through the wrapped manager,
    /// without touching the cache. Forbidden after `finalize_evaluations`.
    pub fn eval_at_points_not_cached<E>(
        &self,
        column_index: usize,
        points: &[E],
        outputs: &mut [E],
    ) -> Result<(), MathError>
    where
        E: FieldElement + From<T>,
    {
        self.inner().eval_at_points(column_index, points, outputs)
    }

    /// Releases the uncached evaluation pathway. After this call only
    /// `eval_on_coset` over already-cached cosets and `eval_at_points` are
    /// available.
    pub fn finalize_evaluations(&mut self) {
        self.lde_manager = None;
    }
}
