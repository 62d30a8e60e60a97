//! Committing to a row-major table of field elements.
//!
//! A table row is one commitment-scheme element (`n_columns` serialized
//! field elements). Decommitment distinguishes *data queries*, whose values
//! the verifier needs from the proof, from *integrity queries*, whose
//! values it reconstructs itself; every other cell sharing a row with a
//! query is transmitted as a clue so row hashes can be recomputed.

use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;

use basalt_math::field::FieldElement;

use crate::channel::{ProverChannel, VerifierChannel};
use crate::commitment::{CommitmentSchemeProver, CommitmentSchemeVerifier, RowCol};
use crate::errors::{ensure, ensure_proof, Result, StarkError};

fn element_decommit_annotation(row_col: &RowCol) -> String {
    format!("Row {}, Column {}", row_col.row, row_col.col)
}

/// The set of rows containing at least one query.
fn all_query_rows(
    data_queries: &BTreeSet<RowCol>,
    integrity_queries: &BTreeSet<RowCol>,
) -> BTreeSet<u64> {
    data_queries
        .iter()
        .chain(integrity_queries.iter())
        .map(|query| query.row)
        .collect()
}

/// The cells that must travel over the channel: every cell in a queried row
/// except the integrity queries themselves.
fn elements_to_be_transmitted(
    n_columns: usize,
    rows: &BTreeSet<u64>,
    integrity_queries: &BTreeSet<RowCol>,
) -> Vec<RowCol> {
    let mut transmitted = Vec::new();
    for row in rows {
        for col in 0..n_columns as u64 {
            let cell = RowCol::new(*row, col);
            if !integrity_queries.contains(&cell) {
                transmitted.push(cell);
            }
        }
    }
    transmitted
}

pub struct TableProver<F: FieldElement> {
    n_columns: usize,
    commitment_scheme: Box<dyn CommitmentSchemeProver>,
    integrity_queries: BTreeSet<RowCol>,
    query_rows: Vec<u64>,
    scheme_rows: Vec<u64>,
    _field: PhantomData<F>,
}

impl<F: FieldElement> TableProver<F> {
    pub fn new(n_columns: usize, commitment_scheme: Box<dyn CommitmentSchemeProver>) -> Self {
        Self {
            n_columns,
            commitment_scheme,
            integrity_queries: BTreeSet::new(),
            query_rows: Vec::new(),
            scheme_rows: Vec::new(),
            _field: PhantomData,
        }
    }

    /// Feeds one segment of rows. Each span of `segment` carries
    /// `n_interleaved_columns` columns interleaved; the spans together make
    /// up all `n_columns` columns, and the table's row-major byte layout is
    /// produced by reading one row at a time across the spans.
    pub fn add_segment_for_commitment(
        &mut self,
        segment: &[&[F]],
        segment_index: usize,
        n_interleaved_columns: usize,
    ) -> Result<()> {
        ensure(
            segment.len() * n_interleaved_columns == self.n_columns,
            || "segment spans do not cover the table columns".to_string(),
        )?;
        let n_rows = self.commitment_scheme.segment_length_in_elements() as usize;
        for span in segment {
            ensure(span.len() == n_rows * n_interleaved_columns, || {
                format!(
                    "segment span length is {} instead of the expected {}",
                    span.len(),
                    n_rows * n_interleaved_columns
                )
            })?;
        }

        let mut bytes = Vec::with_capacity(n_rows * self.n_columns * F::SIZE_IN_BYTES);
        for row in 0..n_rows {
            for span in segment {
                for value in &span[row * n_interleaved_columns..(row + 1) * n_interleaved_columns]
                {
                    bytes.extend_from_slice(&value.to_bytes_vec());
                }
            }
        }
        self.commitment_scheme
            .add_segment_for_commitment(&bytes, segment_index)
    }

    pub fn commit(&mut self, channel: &mut ProverChannel) -> Result<()> {
        self.commitment_scheme.commit(channel)
    }

    /// Returns the rows whose full contents must be supplied to
    /// `decommit`: first the queried rows (ascending), then the rows the
    /// commitment scheme needs, in the scheme's own order.
    pub fn start_decommitment_phase(
        &mut self,
        data_queries: &BTreeSet<RowCol>,
        integrity_queries: &BTreeSet<RowCol>,
    ) -> Result<Vec<u64>> {
        ensure(data_queries.is_disjoint(integrity_queries), || {
            "data queries and integrity queries must be disjoint".to_string()
        })?;
        self.integrity_queries = integrity_queries.clone();
        let rows = all_query_rows(data_queries, integrity_queries);
        self.query_rows = rows.iter().copied().collect();
        self.scheme_rows = self.commitment_scheme.start_decommitment_phase(&rows)?;

        let mut rows_to_fetch = self.query_rows.clone();
        rows_to_fetch.extend_from_slice(&self.scheme_rows);
        Ok(rows_to_fetch)
    }

    /// `elements_data` holds one span per column, with entry `i` being the
    /// column's value at the `i`-th row returned by
    /// `start_decommitment_phase`.
    pub fn decommit(&mut self, elements_data: &[&[F]], channel: &mut ProverChannel) -> Result<()> {
        ensure(elements_data.len() == self.n_columns, || {
            "one data span per column is required".to_string()
        })?;
        let n_fetched_rows = self.query_rows.len() + self.scheme_rows.len();
        for span in elements_data {
            ensure(span.len() == n_fetched_rows, || {
                "data span length does not match the requested rows".to_string()
            })?;
        }

        let query_rows_set: BTreeSet<u64> = self.query_rows.iter().copied().collect();
        for cell in
            elements_to_be_transmitted(self.n_columns, &query_rows_set, &self.integrity_queries)
        {
            let row_position = self
                .query_rows
                .binary_search(&cell.row)
                .expect("transmitted cells come from queried rows");
            let value = elements_data[cell.col as usize][row_position];
            channel.send_field_element(&value, &element_decommit_annotation(&cell))?;
        }

        let mut scheme_bytes =
            Vec::with_capacity(self.scheme_rows.len() * self.n_columns * F::SIZE_IN_BYTES);
        for i in 0..self.scheme_rows.len() {
            for column in elements_data {
                scheme_bytes.extend_from_slice(&column[self.query_rows.len() + i].to_bytes_vec());
            }
        }
        self.commitment_scheme.decommit(&scheme_bytes, channel)
    }
}

pub struct TableVerifier<F: FieldElement> {
    n_columns: usize,
    commitment_scheme: Box<dyn CommitmentSchemeVerifier>,
    _field: PhantomData<F>,
}

impl<F: FieldElement> TableVerifier<F> {
    pub fn new(n_columns: usize, commitment_scheme: Box<dyn CommitmentSchemeVerifier>) -> Self {
        Self {
            n_columns,
            commitment_scheme,
            _field: PhantomData,
        }
    }

    pub fn read_commitment(&mut self, channel: &mut VerifierChannel) -> Result<()> {
        self.commitment_scheme.read_commitment(channel)
    }

    /// Reads the data-query values and every clue cell needed to
    /// reconstruct the queried rows. Integrity queries are *not* read; the
    /// caller fills them in before `verify_decommitment`.
    pub fn query(
        &mut self,
        data_queries: &BTreeSet<RowCol>,
        integrity_queries: &BTreeSet<RowCol>,
        channel: &mut VerifierChannel,
    ) -> Result<BTreeMap<RowCol, F>> {
        ensure(data_queries.is_disjoint(integrity_queries), || {
            "data queries and integrity queries must be disjoint".to_string()
        })?;
        let rows = all_query_rows(data_queries, integrity_queries);
        let mut response = BTreeMap::new();
        for cell in elements_to_be_transmitted(self.n_columns, &rows, integrity_queries) {
            let value =
                channel.receive_field_element::<F>(&element_decommit_annotation(&cell))?;
            response.insert(cell, value);
        }
        Ok(response)
    }

    /// Checks full rows (transmitted cells plus caller-computed integrity
    /// values) against the commitment.
    pub fn verify_decommitment(
        &mut self,
        all_rows_data: &BTreeMap<RowCol, F>,
        channel: &mut VerifierChannel,
    ) -> Result<bool> {
        let mut rows: BTreeMap<u64, Vec<Option<F>>> = BTreeMap::new();
        for (cell, value) in all_rows_data {
            ensure_proof((cell.col as usize) < self.n_columns, || {
                format!("column index {} out of range", cell.col)
            })?;
            rows.entry(cell.row)
                .or_insert_with(|| vec![None; self.n_columns])[cell.col as usize] = Some(*value);
        }

        let mut elements_to_verify = BTreeMap::new();
        for (row, cells) in rows {
            let mut bytes = Vec::with_capacity(self.n_columns * F::SIZE_IN_BYTES);
            for (col, cell) in cells.iter().enumerate() {
                let value = cell.ok_or_else(|| {
                    StarkError::InvariantViolation(format!(
                        "missing value for row {row}, column {col}"
                    ))
                })?;
                bytes.extend_from_slice(&value.to_bytes_vec());
            }
            elements_to_verify.insert(row, bytes);
        }
        self.commitment_scheme
            .verify_integrity(&elements_to_verify, channel)
    }
}

#[cfg(test)]
mod tests {
    use basalt_crypto::fiat_shamir::Prng;
    use basalt_math::field::element::random_element_vector;
    use basalt_math::field::ExtensionFieldElement;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::commitment::{make_commitment_scheme_prover, make_commitment_scheme_verifier};

    type F = ExtensionFieldElement;

    const SEED: &[u8] = b"table";
    const N_ROWS: usize = 16;
    const N_COLUMNS: usize = 4;

    struct Fixture {
        columns: Vec<Vec<F>>,
        proof: Vec<u8>,
    }

    fn value_at(columns: &[Vec<F>], cell: &RowCol) -> F {
        columns[cell.col as usize][cell.row as usize]
    }

    fn prove(
        rng: &mut StdRng,
        data_queries: &BTreeSet<RowCol>,
        integrity_queries: &BTreeSet<RowCol>,
        with_salt: bool,
    ) -> Fixture {
        let columns: Vec<Vec<F>> = (0..N_COLUMNS)
            .map(|_| random_element_vector(rng, N_ROWS))
            .collect();

        let mut channel = ProverChannel::new(Prng::from_seed(SEED));
        let salts_prng = Prng::from_seed(b"table salts");
        let scheme = make_commitment_scheme_prover(
            N_COLUMNS * F::SIZE_IN_BYTES,
            N_ROWS as u64,
            1,
            with_salt,
            Some(&salts_prng),
        )
        .unwrap();
        let mut prover = TableProver::<F>::new(N_COLUMNS, scheme);
        let spans: Vec<&[F]> = columns.iter().map(|c| c.as_slice()).collect();
        prover.add_segment_for_commitment(&spans, 0, 1).unwrap();
        prover.commit(&mut channel).unwrap();

        let rows_to_fetch = prover
            .start_decommitment_phase(data_queries, integrity_queries)
            .unwrap();
        let fetched: Vec<Vec<F>> = columns
            .iter()
            .map(|column| {
                rows_to_fetch
                    .iter()
                    .map(|row| column[*row as usize])
                    .collect()
            })
            .collect();
        let fetched_spans: Vec<&[F]> = fetched.iter().map(|c| c.as_slice()).collect();
        prover.decommit(&fetched_spans, &mut channel).unwrap();

        Fixture {
            columns,
            proof: channel.into_proof(),
        }
    }

    fn verify(
        fixture: &Fixture,
        data_queries: &BTreeSet<RowCol>,
        integrity_queries: &BTreeSet<RowCol>,
        with_salt: bool,
        corrupt_integrity_value: bool,
    ) -> bool {
        let mut channel = VerifierChannel::new(Prng::from_seed(SEED), fixture.proof.clone());
        let scheme = make_commitment_scheme_verifier(
            N_COLUMNS * F::SIZE_IN_BYTES,
            N_ROWS as u64,
            with_salt,
        )
        .unwrap();
        let mut verifier = TableVerifier::<F>::new(N_COLUMNS, scheme);
        verifier.read_commitment(&mut channel).unwrap();

        let mut response = verifier
            .query(data_queries, integrity_queries, &mut channel)
            .unwrap();
        // The response covers the data queries and the row clues, not the
        // integrity queries.
        for query in data_queries {
            assert_eq!(response[query], value_at(&fixture.columns, query));
        }
        for query in integrity_queries {
            assert!(!response.contains_key(query));
            let mut value = value_at(&fixture.columns, query);
            if corrupt_integrity_value {
                value += F::one();
            }
            response.insert(*query, value);
        }
        verifier
            .verify_decommitment(&response, &mut channel)
            .unwrap_or(false)
    }

    fn random_queries(rng: &mut StdRng) -> (BTreeSet<RowCol>, BTreeSet<RowCol>) {
        let mut data_queries = BTreeSet::new();
        let mut integrity_queries = BTreeSet::new();
        for _ in 0..6 {
            let cell = RowCol::new(
                rng.gen_range(0..N_ROWS as u64),
                rng.gen_range(0..N_COLUMNS as u64),
            );
            if rng.gen_bool(0.5) {
                data_queries.insert(cell);
            } else if !data_queries.contains(&cell) {
                integrity_queries.insert(cell);
            }
        }
        (data_queries, integrity_queries)
    }

    #[test]
    fn round_trip_with_mixed_queries() {
        let mut rng = StdRng::seed_from_u64(111);
        for with_salt in [false, true] {
            let (data_queries, integrity_queries) = random_queries(&mut rng);
            if data_queries.is_empty() && integrity_queries.is_empty() {
                continue;
            }
            let fixture = prove(&mut rng, &data_queries, &integrity_queries, with_salt);
            assert!(verify(
                &fixture,
                &data_queries,
                &integrity_queries,
                with_salt,
                false
            ));
        }
    }

    #[test]
    fn wrong_integrity_value_fails() {
        let mut rng = StdRng::seed_from_u64(112);
        let data_queries = BTreeSet::from([RowCol::new(3, 1)]);
        let integrity_queries = BTreeSet::from([RowCol::new(3, 2), RowCol::new(9, 0)]);
        let fixture = prove(&mut rng, &data_queries, &integrity_queries, false);
        assert!(verify(&fixture, &data_queries, &integrity_queries, false, false));
        assert!(!verify(&fixture, &data_queries, &integrity_queries, false, true));
    }

    #[test]
    fn overlapping_query_sets_are_rejected() {
        let mut rng = StdRng::seed_from_u64(113);
        let queries = BTreeSet::from([RowCol::new(1, 1)]);
        let fixture = prove(&mut rng, &queries, &BTreeSet::new(), false);
        let mut channel = VerifierChannel::new(Prng::from_seed(SEED), fixture.proof);
        let scheme = make_commitment_scheme_verifier(
            N_COLUMNS * F::SIZE_IN_BYTES,
            N_ROWS as u64,
            false,
        )
        .unwrap();
        let mut verifier = TableVerifier::<F>::new(N_COLUMNS, scheme);
        verifier.read_commitment(&mut channel).unwrap();
        assert!(verifier.query(&queries, &queries, &mut channel).is_err());
    }
}
