//! Jonker-Volgenant algorithm (C6's LAP kernel): solves the square linear
//! assignment problem by column reduction, reduction transfer, two rounds of
//! augmenting row reduction, then augmentation via shortest augmenting paths.
//!
//! Adapted from a generic dense-matrix trait to a concrete `f64` square
//! matrix; the refiner is the only caller and always presents a square,
//! finite, nonnegative cost matrix bounded by an explicit `max_cost`.

use crate::errors::MatchError;
use crate::sparse::DenseMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assignment {
    Unassigned,
    Assigned(usize),
    Conflict(usize),
}

impl Assignment {
    fn is_unassigned(self) -> bool {
        matches!(self, Assignment::Unassigned)
    }
}

struct Solver<'m> {
    matrix: &'m DenseMatrix,
    n: usize,
    max_cost: f64,
    column_costs: Vec<f64>,
    unassigned_rows: Vec<usize>,
    /// Column -> row.
    assigned_rows: Vec<Assignment>,
    /// Row -> column.
    assigned_columns: Vec<Assignment>,
}

impl<'m> Solver<'m> {
    fn new(matrix: &'m DenseMatrix, max_cost: f64) -> Result<Self, MatchError> {
        let n = matrix.num_rows();
        if matrix.num_cols() != n {
            return Err(MatchError::LAPInfeasible { size: n.max(matrix.num_cols()) });
        }
        Ok(Self {
            matrix,
            n,
            max_cost,
            column_costs: vec![max_cost; n],
            unassigned_rows: Vec::new(),
            assigned_rows: vec![Assignment::Unassigned; n],
            assigned_columns: vec![Assignment::Unassigned; n],
        })
    }

    fn column_reduction(&mut self) -> Result<(), MatchError> {
        for row in 0..self.n {
            for col in 0..self.n {
                let value = self.matrix.get(row, col);
                if !value.is_finite() || value < 0.0 || value >= self.max_cost {
                    return Err(MatchError::LAPInfeasible { size: self.n });
                }
                if value < self.column_costs[col] {
                    self.assigned_rows[col] = Assignment::Assigned(row);
                    self.column_costs[col] = value;
                }
            }
        }

        for col in (0..self.n).rev() {
            let Assignment::Assigned(row) = self.assigned_rows[col] else {
                unreachable!("every column was assigned a minimizing row above");
            };
            match self.assigned_columns[row] {
                Assignment::Unassigned => {
                    self.assigned_columns[row] = Assignment::Assigned(col);
                }
                Assignment::Assigned(prev) | Assignment::Conflict(prev) => {
                    self.assigned_columns[row] = Assignment::Conflict(prev);
                    self.assigned_rows[col] = Assignment::Unassigned;
                }
            }
        }
        Ok(())
    }

    fn reduction_transfer(&mut self) {
        debug_assert!(self.unassigned_rows.is_empty());
        for row in 0..self.n {
            match self.assigned_columns[row] {
                Assignment::Unassigned => self.unassigned_rows.push(row),
                Assignment::Conflict(col) => {
                    self.assigned_columns[row] = Assignment::Assigned(col);
                }
                Assignment::Assigned(assigned_col) => {
                    let minimum_reduced_cost = (0..self.n)
                        .filter(|&col| col != assigned_col)
                        .map(|col| self.matrix.get(row, col) - self.column_costs[col])
                        .fold(f64::INFINITY, f64::min);
                    let minimum_reduced_cost =
                        if minimum_reduced_cost.is_finite() { minimum_reduced_cost } else { self.max_cost };
                    self.column_costs[assigned_col] -= minimum_reduced_cost;
                }
            }
        }
    }

    fn first_and_second_min(&self, row: usize) -> (usize, f64, Option<usize>, f64) {
        let mut first_col = 0;
        let mut first_value = self.matrix.get(row, 0) - self.column_costs[0];
        let mut second_col = None;
        let mut second_value = self.max_cost;

        for col in 1..self.n {
            let reduced = self.matrix.get(row, col) - self.column_costs[col];
            if reduced < second_value {
                if reduced >= first_value {
                    second_col = Some(col);
                    second_value = reduced;
                } else {
                    second_col = Some(first_col);
                    second_value = first_value;
                    first_col = col;
                    first_value = reduced;
                }
            }
        }
        (first_col, first_value, second_col, second_value)
    }

    fn augmenting_row_reduction(&mut self) {
        if self.unassigned_rows.is_empty() {
            return;
        }
        let original_len = self.unassigned_rows.len();
        let mut current = 0;
        let mut kept = 0;
        let mut iterations = 0usize;

        while current < original_len {
            let row = self.unassigned_rows[current];
            current += 1;
            iterations += 1;

            let (mut first_col, first_value, second_col, second_value) = self.first_and_second_min(row);
            let mut displaced = self.assigned_rows[first_col];

            if iterations < current * self.n {
                if first_value < second_value {
                    self.column_costs[first_col] -= second_value - first_value;
                } else if let (Assignment::Assigned(_), Some(second_col)) = (displaced, second_col) {
                    first_col = second_col;
                    displaced = self.assigned_rows[first_col];
                }
                if let Assignment::Assigned(displaced_row) = displaced {
                    if first_value < second_value {
                        current -= 1;
                        self.unassigned_rows[current] = displaced_row;
                    } else {
                        self.unassigned_rows[kept] = displaced_row;
                        kept += 1;
                    }
                }
            } else if let Assignment::Assigned(displaced_row) = displaced {
                self.unassigned_rows[kept] = displaced_row;
                kept += 1;
            }

            self.assigned_rows[first_col] = Assignment::Assigned(row);
            self.assigned_columns[row] = Assignment::Assigned(first_col);
        }

        self.unassigned_rows.truncate(kept);
    }

    fn scan(
        &self,
        lower_bound: &mut usize,
        upper_bound: &mut usize,
        to_scan: &mut [usize],
        distances: &mut [f64],
        predecessors: &mut [usize],
    ) -> Option<usize> {
        while *lower_bound != *upper_bound {
            let col = to_scan[*lower_bound];
            *lower_bound += 1;
            let Assignment::Assigned(row) = self.assigned_rows[col] else {
                unreachable!("columns on the scan frontier are always assigned");
            };
            let minimum_distance = distances[col];
            let initial_reduced_cost = self.matrix.get(row, col) - self.column_costs[col] - minimum_distance;

            let current_upper = *upper_bound;
            for k in current_upper..to_scan.len() {
                let candidate_col = to_scan[k];
                let reduced_cost = self.matrix.get(row, candidate_col)
                    - self.column_costs[candidate_col]
                    - initial_reduced_cost;
                if reduced_cost < distances[candidate_col] {
                    distances[candidate_col] = reduced_cost;
                    predecessors[candidate_col] = row;
                    if reduced_cost == minimum_distance {
                        if self.assigned_rows[candidate_col].is_unassigned() {
                            return Some(candidate_col);
                        }
                        to_scan[k] = to_scan[*upper_bound];
                        to_scan[*upper_bound] = candidate_col;
                        *upper_bound += 1;
                    }
                }
            }
        }
        None
    }

    fn find_path(
        &mut self,
        start_row: usize,
        to_scan: &mut [usize],
        predecessors: &mut [usize],
        distances: &mut [f64],
    ) -> usize {
        let mut lower_bound = 0;
        let mut upper_bound = 0;
        let mut ready = 0;

        for col in 0..self.n {
            to_scan[col] = col;
            predecessors[col] = start_row;
            distances[col] = self.matrix.get(start_row, col) - self.column_costs[col];
        }

        let sink = 'outer: loop {
            if lower_bound == upper_bound {
                ready = lower_bound;
                upper_bound = find_minimum_distance(lower_bound, distances, to_scan);
                for &col in &to_scan[lower_bound..upper_bound] {
                    if self.assigned_rows[col].is_unassigned() {
                        break 'outer col;
                    }
                }
            }
            if let Some(col) = self.scan(&mut lower_bound, &mut upper_bound, to_scan, distances, predecessors) {
                break 'outer col;
            }
        };

        let minimum_distance = distances[to_scan[lower_bound]];
        for &col in &to_scan[0..ready] {
            self.column_costs[col] += distances[col] - minimum_distance;
        }
        sink
    }

    fn augmentation(&mut self) {
        if self.unassigned_rows.is_empty() {
            return;
        }
        let mut to_scan = vec![0usize; self.n];
        let mut predecessors = vec![0usize; self.n];
        let mut distances = vec![self.max_cost; self.n];

        while let Some(row) = self.unassigned_rows.pop() {
            let sink = self.find_path(row, &mut to_scan, &mut predecessors, &mut distances);
            backtrack(sink, &predecessors, &mut self.assigned_rows, &mut self.assigned_columns, row);
        }
    }

    fn into_row_to_column(self) -> Vec<usize> {
        let mut row_to_col = vec![0usize; self.n];
        for (col, assignment) in self.assigned_rows.into_iter().enumerate() {
            let Assignment::Assigned(row) = assignment else {
                unreachable!("every column is assigned once augmentation completes");
            };
            row_to_col[row] = col;
        }
        row_to_col
    }
}

fn find_minimum_distance(lower_bound: usize, distances: &[f64], to_scan: &mut [usize]) -> usize {
    let mut upper_bound = lower_bound + 1;
    let mut minimum_distance = distances[to_scan[lower_bound]];
    for k in lower_bound + 1..to_scan.len() {
        let col = to_scan[k];
        let distance = distances[col];
        if distance <= minimum_distance {
            if distance < minimum_distance {
                upper_bound = lower_bound;
                minimum_distance = distance;
            }
            to_scan[k] = to_scan[upper_bound];
            to_scan[upper_bound] = col;
            upper_bound += 1;
        }
    }
    upper_bound
}

fn backtrack(
    mut col: usize,
    predecessors: &[usize],
    assigned_rows: &mut [Assignment],
    assigned_columns: &mut [Assignment],
    start_row: usize,
) {
    loop {
        let row = predecessors[col];
        assigned_rows[col] = Assignment::Assigned(row);
        if row == start_row {
            assigned_columns[row] = Assignment::Assigned(col);
            break;
        }
        let Assignment::Assigned(old_col) = assigned_columns[row] else {
            unreachable!("every row on the augmenting path was previously assigned");
        };
        assigned_columns[row] = Assignment::Assigned(col);
        col = old_col;
    }
}

/// Solves the square linear assignment problem, minimizing total cost.
/// `cost` must be square; every entry must be finite, nonnegative, and
/// strictly less than `max_cost`. Returns `row_to_col[row]`, the column
/// assigned to each row.
pub fn solve(cost: &DenseMatrix, max_cost: f64) -> Result<Vec<usize>, MatchError> {
    if !max_cost.is_finite() || max_cost <= 0.0 {
        return Err(MatchError::LAPInfeasible { size: cost.num_rows() });
    }
    let mut solver = Solver::new(cost, max_cost)?;
    solver.column_reduction()?;
    solver.reduction_transfer();
    solver.augmenting_row_reduction();
    solver.augmenting_row_reduction();
    solver.augmentation();
    Ok(solver.into_row_to_column())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_a_trivial_diagonal_preference() {
        let cost = DenseMatrix::from_row_major(vec![1.0, 10.0, 10.0, 1.0], 2, 2);
        let assignment = solve(&cost, 1000.0).unwrap();
        assert_eq!(assignment, vec![0, 1]);
    }

    #[test]
    fn solves_a_swap_preference() {
        let cost = DenseMatrix::from_row_major(vec![10.0, 1.0, 1.0, 10.0], 2, 2);
        let assignment = solve(&cost, 1000.0).unwrap();
        assert_eq!(assignment, vec![1, 0]);
    }

    #[test]
    fn rejects_a_non_square_matrix() {
        let cost = DenseMatrix::from_row_major(vec![1.0, 2.0, 3.0], 1, 3);
        assert!(matches!(solve(&cost, 1000.0), Err(MatchError::LAPInfeasible { .. })));
    }

    #[test]
    fn three_by_three_finds_the_minimum_cost_assignment() {
        // Optimal assignment: row0->col1 (2), row1->col0 (2), row2->col2 (1) = 5.
        let cost = DenseMatrix::from_row_major(vec![5.0, 2.0, 9.0, 2.0, 8.0, 7.0, 6.0, 4.0, 1.0], 3, 3);
        let assignment = solve(&cost, 1000.0).unwrap();
        let total: f64 = assignment.iter().enumerate().map(|(row, &col)| cost.get(row, col)).sum();
        assert_eq!(total, 5.0);
    }
}
