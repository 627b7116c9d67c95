use log::{debug, info};
use nalgebra::{Cholesky, DMatrix, DVector, SymmetricEigen};
use ndarray::Array1;

use crate::error::Result;
use crate::math::sdp::{SdpProblem, SdpSolution, SdpSolver, SolverConfig, SolverStatus};

/// Primal-dual path-following interior-point method for [`SdpProblem`].
///
/// The problem is solved together with its conic dual
///
/// ```text
/// minimize    <C, X> + cᵀx
/// subject to  <A_i, X> + Σ_k a_ki x_k = b_i,   X ⪰ 0, x >= 0
/// ```
///
/// from an infeasible start. Each iteration:
/// 1. Compute residuals and objectives and check convergence
/// 2. Check for Farkas-type certificates of infeasibility or unboundedness
/// 3. Form and factor the Schur complement of the HKM direction
/// 4. Take a predictor step to choose the centering parameter
/// 5. Take a Mehrotra-corrected step, primal and dual lengths apart
#[derive(Debug, Clone, Default)]
pub struct InteriorPointSolver {
    config: SolverConfig,
}

impl InteriorPointSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }
}

impl SdpSolver for InteriorPointSolver {
    fn solve(&self, problem: &SdpProblem) -> Result<SdpSolution> {
        problem.validate()?;
        let data = ConicData::new(problem);
        Ok(data.solve(&self.config))
    }
}

/// Problem data in the dense layout used by the iterations.
struct ConicData {
    n: usize,
    b: DVector<f64>,
    c_psd: DMatrix<f64>,
    c_lin: DVector<f64>,
    /// `A_i` as `(row, col, value)`, one triple per stored entry.
    psd: Vec<Vec<(usize, usize, f64)>>,
    /// `A_i` with off-diagonal entries listed in both orientations.
    directed: Vec<Vec<(usize, usize, f64)>>,
    /// Column `i` of the linear block as `(row, value)`.
    columns: Vec<Vec<(usize, f64)>>,
    rows: Vec<Vec<(usize, f64)>>,
}

#[derive(Clone)]
struct Iterate {
    x: DMatrix<f64>,
    xl: DVector<f64>,
    y: DVector<f64>,
    s: DMatrix<f64>,
    sl: DVector<f64>,
}

struct Direction {
    dx: DMatrix<f64>,
    dxl: DVector<f64>,
    dy: DVector<f64>,
    ds: DMatrix<f64>,
    dsl: DVector<f64>,
}

struct Residuals {
    rd: DMatrix<f64>,
    rdl: DVector<f64>,
    primal_objective: f64,
    dual_objective: f64,
    complementarity: f64,
    primal_infeasibility: f64,
    dual_infeasibility: f64,
    gap: f64,
    /// `‖𝒜(X, x)‖`.
    primal_image: f64,
    /// `‖𝒜ᵀ(y) + (S, s)‖`.
    dual_image: f64,
}

impl ConicData {
    fn new(problem: &SdpProblem) -> Self {
        let n = problem.psd_dim;
        let m = problem.num_variables();
        let k = problem.rows.len();

        let b = DVector::from_iterator(m, problem.objective.iter().copied());
        let c_psd = dense_symmetric(
            n,
            problem
                .psd_constant
                .iter()
                .map(|e| (e.row, e.col, e.value)),
        );
        let c_lin = DVector::from_iterator(k, problem.rows.iter().map(|row| row.constant));

        let psd: Vec<Vec<(usize, usize, f64)>> = problem
            .psd_coefficients
            .iter()
            .map(|entries| entries.iter().map(|e| (e.row, e.col, e.value)).collect())
            .collect();
        let directed: Vec<Vec<(usize, usize, f64)>> = psd
            .iter()
            .map(|entries| {
                entries
                    .iter()
                    .flat_map(|&(r, c, v)| {
                        let mirrored = if r != c { Some((c, r, v)) } else { None };
                        std::iter::once((r, c, v)).chain(mirrored)
                    })
                    .collect()
            })
            .collect();

        let mut columns = vec![Vec::new(); m];
        let mut rows = Vec::with_capacity(k);
        for (row_index, row) in problem.rows.iter().enumerate() {
            for &(index, value) in &row.coefficients {
                columns[index].push((row_index, value));
            }
            rows.push(row.coefficients.clone());
        }

        Self {
            n,
            b,
            c_psd,
            c_lin,
            psd,
            directed,
            columns,
            rows,
        }
    }

    fn m(&self) -> usize {
        self.b.len()
    }

    fn k(&self) -> usize {
        self.c_lin.len()
    }

    /// `𝒜(X, x)_i = <A_i, X> + Σ_k a_ki x_k`.
    fn apply(&self, x: &DMatrix<f64>, xl: &DVector<f64>) -> DVector<f64> {
        DVector::from_fn(self.m(), |i, _| {
            let psd: f64 = self.psd[i]
                .iter()
                .map(|&(r, c, v)| if r == c { v * x[(r, c)] } else { 2.0 * v * x[(r, c)] })
                .sum();
            let linear: f64 = self.columns[i].iter().map(|&(k, v)| v * xl[k]).sum();
            psd + linear
        })
    }

    /// `𝒜ᵀ(y) = (Σ y_i A_i, (Σ_i a_ki y_i)_k)`.
    fn adjoint(&self, y: &DVector<f64>) -> (DMatrix<f64>, DVector<f64>) {
        let mut matrix = DMatrix::zeros(self.n, self.n);
        let mut linear = DVector::zeros(self.k());
        for (i, &yi) in y.iter().enumerate() {
            if yi == 0.0 {
                continue;
            }
            for &(r, c, v) in &self.directed[i] {
                matrix[(r, c)] += yi * v;
            }
            for &(k, v) in &self.columns[i] {
                linear[k] += yi * v;
            }
        }
        (matrix, linear)
    }

    fn residuals(&self, it: &Iterate) -> Residuals {
        let image = self.apply(&it.x, &it.xl);
        let rp = &self.b - &image;
        let (ay, ayl) = self.adjoint(&it.y);
        let rd = &self.c_psd - &it.s - &ay;
        let rdl = &self.c_lin - &it.sl - &ayl;

        let primal_objective = self.c_psd.dot(&it.x) + self.c_lin.dot(&it.xl);
        let dual_objective = self.b.dot(&it.y);
        let complementarity = it.x.dot(&it.s) + it.xl.dot(&it.sl);

        let b_norm = self.b.norm();
        let c_norm = (self.c_psd.norm_squared() + self.c_lin.norm_squared()).sqrt();
        let dual_image = ((&ay + &it.s).norm_squared() + (&ayl + &it.sl).norm_squared()).sqrt();

        Residuals {
            primal_infeasibility: rp.norm() / (1.0 + b_norm),
            dual_infeasibility: (rd.norm_squared() + rdl.norm_squared()).sqrt() / (1.0 + c_norm),
            gap: (primal_objective - dual_objective).abs().max(complementarity)
                / (1.0 + primal_objective.abs() + dual_objective.abs()),
            primal_image: image.norm(),
            dual_image,
            rd,
            rdl,
            primal_objective,
            dual_objective,
            complementarity,
        }
    }

    /// Starting point `X = ξI, S = ηI` scaled to the data.
    fn initial_point(&self) -> Iterate {
        let cone = (self.n + self.k()) as f64;
        let norms: Vec<f64> = (0..self.m())
            .map(|i| {
                let psd: f64 = self.psd[i]
                    .iter()
                    .map(|&(r, c, v)| if r == c { v * v } else { 2.0 * v * v })
                    .sum();
                let linear: f64 = self.columns[i].iter().map(|&(_, v)| v * v).sum();
                (psd + linear).sqrt()
            })
            .collect();

        let primal_scale = norms
            .iter()
            .zip(self.b.iter())
            .map(|(norm, b)| (1.0 + b.abs()) / (1.0 + norm))
            .fold(0.0, f64::max);
        let c_norm = (self.c_psd.norm_squared() + self.c_lin.norm_squared()).sqrt();

        let xi = 10f64.max(cone.sqrt()).max(cone.sqrt() * primal_scale);
        let eta = 10f64
            .max(cone.sqrt())
            .max(norms.iter().copied().fold(0.0, f64::max))
            .max(c_norm);

        Iterate {
            x: DMatrix::from_diagonal_element(self.n, self.n, xi),
            xl: DVector::from_element(self.k(), xi),
            y: DVector::zeros(self.m()),
            s: DMatrix::from_diagonal_element(self.n, self.n, eta),
            sl: DVector::from_element(self.k(), eta),
        }
    }

    /// `M_ij = tr(A_i X A_j S⁻¹) + Σ_k a_ki a_kj x_k / s_k`.
    fn schur(&self, it: &Iterate, s_inv: &DMatrix<f64>) -> DMatrix<f64> {
        let m = self.m();
        let mut schur = DMatrix::zeros(m, m);
        for i in 0..m {
            if self.directed[i].is_empty() {
                continue;
            }
            for j in i..m {
                let mut value = 0.0;
                for &(p, q, alpha) in &self.directed[i] {
                    for &(r, t, beta) in &self.directed[j] {
                        value += alpha * beta * it.x[(q, r)] * s_inv[(t, p)];
                    }
                }
                schur[(i, j)] = value;
                schur[(j, i)] = value;
            }
        }
        for (k, row) in self.rows.iter().enumerate() {
            let ratio = it.xl[k] / it.sl[k];
            for &(i, a) in row {
                for &(j, b) in row {
                    schur[(i, j)] += a * b * ratio;
                }
            }
        }
        schur
    }

    /// Factors the Schur complement, adding a growing diagonal shift when
    /// the system is singular.
    fn factor(schur: DMatrix<f64>) -> Option<Cholesky<f64, nalgebra::Dyn>> {
        let scale = schur.diagonal().iter().copied().fold(1.0, f64::max);
        let mut shift = 1e-14 * scale;
        for _ in 0..8 {
            let mut shifted = schur.clone();
            for i in 0..shifted.nrows() {
                shifted[(i, i)] += shift;
            }
            if let Some(factor) = Cholesky::new(shifted) {
                return Some(factor);
            }
            shift *= 100.0;
        }
        None
    }

    /// HKM direction towards the targets `XS = T`, `x ∘ s = t`.
    #[allow(clippy::too_many_arguments)]
    fn direction(
        &self,
        it: &Iterate,
        res: &Residuals,
        s_inv: &DMatrix<f64>,
        factor: &Cholesky<f64, nalgebra::Dyn>,
        correction: &DVector<f64>,
        target: &DMatrix<f64>,
        target_lin: &DVector<f64>,
    ) -> Direction {
        let rhs = &self.b - self.apply(target, target_lin) + correction;
        let dy = factor.solve(&rhs);
        let (ady, adyl) = self.adjoint(&dy);
        let ds = &res.rd - ady;
        let dsl = &res.rdl - adyl;
        let dx = target - &it.x - symmetric_part(&(&it.x * &ds * s_inv));
        let dxl = DVector::from_fn(self.k(), |k, _| {
            target_lin[k] - it.xl[k] - it.xl[k] * dsl[k] / it.sl[k]
        });
        Direction {
            dx,
            dxl,
            dy,
            ds,
            dsl,
        }
    }

    fn solve(&self, config: &SolverConfig) -> SdpSolution {
        let m = self.m();
        let k = self.k();
        let cone = self.n + k;
        info!(
            "Solving SDP: {} variables, PSD block {}x{}, {} linear rows",
            m, self.n, self.n, k
        );

        if cone == 0 {
            let status = if self.b.iter().all(|&v| v == 0.0) {
                SolverStatus::Optimal
            } else {
                SolverStatus::Unbounded
            };
            return SdpSolution {
                status,
                objective: 0.0,
                y: Array1::zeros(m),
                iterations: 0,
                primal_residual: 0.0,
                dual_residual: 0.0,
                gap: 0.0,
            };
        }

        let mut it = self.initial_point();
        let mut iterations = 0;
        let mut status = SolverStatus::MaxIterations;

        while iterations < config.max_iterations {
            // 1. Residuals and convergence
            let res = self.residuals(&it);
            debug!(
                "iter {:3}: pobj {:.8e} dobj {:.8e} pinf {:.2e} dinf {:.2e} gap {:.2e}",
                iterations,
                res.primal_objective,
                res.dual_objective,
                res.primal_infeasibility,
                res.dual_infeasibility,
                res.gap
            );
            if !res.primal_objective.is_finite() || !res.dual_objective.is_finite() {
                status = SolverStatus::NumericalFailure;
                break;
            }
            if res.primal_infeasibility <= config.tolerance
                && res.dual_infeasibility <= config.tolerance
                && res.gap <= config.tolerance
            {
                status = SolverStatus::Optimal;
                break;
            }

            // 2. Certificates
            if res.primal_objective < 0.0
                && res.primal_image <= config.infeasibility_tolerance * -res.primal_objective
            {
                status = SolverStatus::Infeasible;
                break;
            }
            if res.dual_objective > 0.0
                && res.dual_image <= config.infeasibility_tolerance * res.dual_objective
            {
                status = SolverStatus::Unbounded;
                break;
            }

            // 3. Schur complement
            let s_inv = match Cholesky::new(it.s.clone()) {
                Some(factor) => factor.inverse(),
                None => {
                    status = SolverStatus::NumericalFailure;
                    break;
                }
            };
            let factor = match Self::factor(self.schur(&it, &s_inv)) {
                Some(factor) => factor,
                None => {
                    status = SolverStatus::NumericalFailure;
                    break;
                }
            };
            let correction = self.apply(
                &symmetric_part(&(&it.x * &res.rd * &s_inv)),
                &DVector::from_fn(k, |j, _| it.xl[j] * res.rdl[j] / it.sl[j]),
            );
            let mu = res.complementarity / cone as f64;

            // 4. Predictor
            let predictor = self.direction(
                &it,
                &res,
                &s_inv,
                &factor,
                &correction,
                &DMatrix::zeros(self.n, self.n),
                &DVector::zeros(k),
            );
            let alpha_primal = max_step(&it.x, &it.xl, &predictor.dx, &predictor.dxl).min(1.0);
            let alpha_dual = max_step(&it.s, &it.sl, &predictor.ds, &predictor.dsl).min(1.0);
            let mu_affine = ((&it.x + &predictor.dx * alpha_primal)
                .dot(&(&it.s + &predictor.ds * alpha_dual))
                + (&it.xl + &predictor.dxl * alpha_primal)
                    .dot(&(&it.sl + &predictor.dsl * alpha_dual)))
                / cone as f64;
            let sigma = (mu_affine / mu).powi(3).clamp(0.0, 1.0);

            // 5. Corrector
            let target = &s_inv * (sigma * mu)
                - symmetric_part(&(&predictor.dx * &predictor.ds * &s_inv));
            let target_lin = DVector::from_fn(k, |j, _| {
                (sigma * mu - predictor.dxl[j] * predictor.dsl[j]) / it.sl[j]
            });
            let step = self.direction(
                &it,
                &res,
                &s_inv,
                &factor,
                &correction,
                &target,
                &target_lin,
            );

            let fraction = 0.9 + 0.09 * alpha_primal.min(alpha_dual);
            let alpha_primal = (fraction * max_step(&it.x, &it.xl, &step.dx, &step.dxl)).min(1.0);
            let alpha_dual = (fraction * max_step(&it.s, &it.sl, &step.ds, &step.dsl)).min(1.0);

            it.x = symmetric_part(&(&it.x + &step.dx * alpha_primal));
            it.xl += &step.dxl * alpha_primal;
            it.s = symmetric_part(&(&it.s + &step.ds * alpha_dual));
            it.sl += &step.dsl * alpha_dual;
            it.y += &step.dy * alpha_dual;
            iterations += 1;

            if alpha_primal.max(alpha_dual) < 1e-12 {
                debug!("Step lengths collapsed at iteration {}", iterations);
                status = SolverStatus::NumericalFailure;
                break;
            }
        }

        let res = self.residuals(&it);
        if matches!(
            status,
            SolverStatus::MaxIterations | SolverStatus::NumericalFailure
        ) && res.primal_infeasibility <= config.loose_tolerance
            && res.dual_infeasibility <= config.loose_tolerance
            && res.gap <= config.loose_tolerance
        {
            status = SolverStatus::OptimalInaccurate;
        }
        info!(
            "SDP solver finished after {} iterations: {} (objective {:.8e})",
            iterations, status, res.dual_objective
        );

        SdpSolution {
            status,
            objective: res.dual_objective,
            y: Array1::from_iter(it.y.iter().copied()),
            iterations,
            primal_residual: res.primal_infeasibility,
            dual_residual: res.dual_infeasibility,
            gap: res.gap,
        }
    }
}

fn dense_symmetric<I>(n: usize, entries: I) -> DMatrix<f64>
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut matrix = DMatrix::zeros(n, n);
    for (r, c, v) in entries {
        matrix[(r, c)] += v;
        if r != c {
            matrix[(c, r)] += v;
        }
    }
    matrix
}

fn symmetric_part(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    (matrix + matrix.transpose()) * 0.5
}

/// Largest `α` keeping `Z + αΔZ ⪰ 0` and `z + αΔz >= 0`, infinite when the
/// direction never leaves the cone.
fn max_step(z: &DMatrix<f64>, zl: &DVector<f64>, dz: &DMatrix<f64>, dzl: &DVector<f64>) -> f64 {
    let mut alpha = f64::INFINITY;
    for (value, delta) in zl.iter().zip(dzl.iter()) {
        if *delta < 0.0 {
            alpha = alpha.min(-value / delta);
        }
    }

    if z.nrows() > 0 {
        let lower = match Cholesky::new(z.clone()) {
            Some(factor) => factor.l(),
            None => return 0.0,
        };
        // L⁻¹ ΔZ L⁻ᵀ
        let scaled = match lower
            .solve_lower_triangular(dz)
            .and_then(|half| lower.solve_lower_triangular(&half.transpose()))
        {
            Some(scaled) => scaled,
            None => return 0.0,
        };
        let smallest = SymmetricEigen::new(symmetric_part(&scaled))
            .eigenvalues
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        if smallest < 0.0 {
            alpha = alpha.min(-1.0 / smallest);
        }
    }
    alpha
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::sdp::{LinearRow, SymmetricEntry};
    use approx::assert_relative_eq;
    use ndarray::array;

    fn row(constant: f64, coefficients: Vec<(usize, f64)>) -> LinearRow {
        LinearRow {
            constant,
            coefficients,
        }
    }

    #[test]
    fn test_linear_program() {
        // max y0 + y1 s.t. y0 <= 1, y1 <= 2, y0 + y1 <= 2.5
        let mut problem = SdpProblem::new(array![1.0, 1.0], 0);
        problem.rows = vec![
            row(1.0, vec![(0, 1.0)]),
            row(2.0, vec![(1, 1.0)]),
            row(2.5, vec![(0, 1.0), (1, 1.0)]),
        ];
        let solution = InteriorPointSolver::default().solve(&problem).unwrap();

        assert_eq!(solution.status, SolverStatus::Optimal);
        assert_relative_eq!(solution.objective, 2.5, epsilon = 1e-6);
        assert!(solution.y[0] <= 1.0 + 1e-6);
        assert!(solution.y[1] <= 2.0 + 1e-6);
    }

    #[test]
    fn test_two_by_two_gram() {
        // max g01 s.t. [[g00, g01], [g01, g11]] ⪰ 0, g00 <= 1, g11 <= 1
        let mut problem = SdpProblem::new(array![0.0, 1.0, 0.0], 2);
        problem.psd_coefficients = vec![
            vec![SymmetricEntry::new(0, 0, -1.0)],
            vec![SymmetricEntry::new(0, 1, -1.0)],
            vec![SymmetricEntry::new(1, 1, -1.0)],
        ];
        problem.rows = vec![row(1.0, vec![(0, 1.0)]), row(1.0, vec![(2, 1.0)])];
        let solution = InteriorPointSolver::default().solve(&problem).unwrap();

        assert_eq!(solution.status, SolverStatus::Optimal);
        assert_relative_eq!(solution.objective, 1.0, epsilon = 1e-6);
        assert_relative_eq!(solution.y[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(solution.y[2], 1.0, epsilon = 1e-6);
        assert!(solution.iterations > 0);
    }

    #[test]
    fn test_unbounded_program_is_detected() {
        // max y0 s.t. -y0 <= 0
        let mut problem = SdpProblem::new(array![1.0], 0);
        problem.rows = vec![row(0.0, vec![(0, -1.0)])];
        let solution = InteriorPointSolver::default().solve(&problem).unwrap();
        assert_eq!(solution.status, SolverStatus::Unbounded);
    }

    #[test]
    fn test_infeasible_program_is_not_reported_optimal() {
        // y0 <= -1 and -y0 <= 0
        let mut problem = SdpProblem::new(array![1.0], 0);
        problem.rows = vec![row(-1.0, vec![(0, 1.0)]), row(0.0, vec![(0, -1.0)])];
        let solution = InteriorPointSolver::default().solve(&problem).unwrap();
        assert!(!solution.status.is_success());
    }

    #[test]
    fn test_iteration_limit() {
        let mut problem = SdpProblem::new(array![0.0, 1.0, 0.0], 2);
        problem.psd_coefficients = vec![
            vec![SymmetricEntry::new(0, 0, -1.0)],
            vec![SymmetricEntry::new(0, 1, -1.0)],
            vec![SymmetricEntry::new(1, 1, -1.0)],
        ];
        problem.rows = vec![row(1.0, vec![(0, 1.0)]), row(1.0, vec![(2, 1.0)])];
        let config = SolverConfig {
            max_iterations: 1,
            ..SolverConfig::default()
        };
        let solution = InteriorPointSolver::new(config).solve(&problem).unwrap();
        assert_eq!(solution.status, SolverStatus::MaxIterations);
        assert_eq!(solution.iterations, 1);
    }

    #[test]
    fn test_malformed_problem_is_rejected() {
        let mut problem = SdpProblem::new(array![1.0], 1);
        problem.psd_coefficients[0].push(SymmetricEntry::new(1, 1, 1.0));
        assert!(InteriorPointSolver::default().solve(&problem).is_err());
    }

    #[test]
    fn test_max_step_stops_at_cone_boundary() {
        let z = DMatrix::identity(2, 2);
        let dz = DMatrix::from_row_slice(2, 2, &[-2.0, 0.0, 0.0, 1.0]);
        let zl = DVector::from_vec(vec![1.0]);
        let dzl = DVector::from_vec(vec![-0.25]);
        assert_relative_eq!(max_step(&z, &zl, &dz, &dzl), 0.5, epsilon = 1e-12);

        let dz = DMatrix::identity(2, 2);
        let dzl = DVector::from_vec(vec![1.0]);
        assert!(max_step(&z, &zl, &dz, &dzl).is_infinite());
    }
}
