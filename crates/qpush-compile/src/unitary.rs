//! 2x2 unitary matrices for single-qubit gate fusion.
//!
//! Runs of single-qubit gates are multiplied into one [`Unitary2x2`], split
//! into ZYZ Euler angles, and re-emitted either as a `U` gate or as the
//! IBM `rz`/`sx` sequence described by [`ZsxStep`].

use std::f64::consts::PI;

use num_complex::Complex64;
use qpush_ir::StandardGate;

/// Tolerance for floating point comparisons.
pub(crate) const EPSILON: f64 = 1e-10;

/// A 2x2 unitary matrix in row-major order.
#[derive(Debug, Clone, Copy)]
pub struct Unitary2x2 {
    /// The matrix elements in row-major order: [[a, b], [c, d]].
    pub data: [Complex64; 4],
}

/// One step of an `rz`/`sx`/`x` sequence, in time order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZsxStep {
    Rz(f64),
    Sx,
    X,
}

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

impl Unitary2x2 {
    pub fn new(a: Complex64, b: Complex64, c: Complex64, d: Complex64) -> Self {
        Self { data: [a, b, c, d] }
    }

    pub fn identity() -> Self {
        Self::new(c(1.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(1.0, 0.0))
    }

    pub fn h() -> Self {
        let s = std::f64::consts::FRAC_1_SQRT_2;
        Self::new(c(s, 0.0), c(s, 0.0), c(s, 0.0), c(-s, 0.0))
    }

    pub fn x() -> Self {
        Self::new(c(0.0, 0.0), c(1.0, 0.0), c(1.0, 0.0), c(0.0, 0.0))
    }

    pub fn y() -> Self {
        Self::new(c(0.0, 0.0), c(0.0, -1.0), c(0.0, 1.0), c(0.0, 0.0))
    }

    pub fn z() -> Self {
        Self::p(PI)
    }

    pub fn sx() -> Self {
        Self::new(c(0.5, 0.5), c(0.5, -0.5), c(0.5, -0.5), c(0.5, 0.5))
    }

    pub fn sxdg() -> Self {
        Self::new(c(0.5, -0.5), c(0.5, 0.5), c(0.5, 0.5), c(0.5, -0.5))
    }

    pub fn rx(theta: f64) -> Self {
        let (s, co) = (theta / 2.0).sin_cos();
        Self::new(c(co, 0.0), c(0.0, -s), c(0.0, -s), c(co, 0.0))
    }

    pub fn ry(theta: f64) -> Self {
        let (s, co) = (theta / 2.0).sin_cos();
        Self::new(c(co, 0.0), c(-s, 0.0), c(s, 0.0), c(co, 0.0))
    }

    /// `diag(e^{-iθ/2}, e^{iθ/2})`.
    pub fn rz(theta: f64) -> Self {
        Self::new(
            Complex64::from_polar(1.0, -theta / 2.0),
            c(0.0, 0.0),
            c(0.0, 0.0),
            Complex64::from_polar(1.0, theta / 2.0),
        )
    }

    /// Phase gate `diag(1, e^{iλ})`. Also covers S, Sdg, T and Tdg.
    pub fn p(lambda: f64) -> Self {
        Self::new(
            c(1.0, 0.0),
            c(0.0, 0.0),
            c(0.0, 0.0),
            Complex64::from_polar(1.0, lambda),
        )
    }

    /// `U(θ, φ, λ)` in the OpenQASM 3 convention.
    pub fn u(theta: f64, phi: f64, lambda: f64) -> Self {
        let (s, co) = (theta / 2.0).sin_cos();
        Self::new(
            c(co, 0.0),
            -Complex64::from_polar(s, lambda),
            Complex64::from_polar(s, phi),
            Complex64::from_polar(co, phi + lambda),
        )
    }

    /// Matrix of a bound single-qubit standard gate.
    ///
    /// Returns `None` for two-qubit gates and for gates whose parameters
    /// are still symbolic.
    pub fn from_gate(gate: &StandardGate) -> Option<Self> {
        let m = match gate {
            StandardGate::I => Self::identity(),
            StandardGate::X => Self::x(),
            StandardGate::Y => Self::y(),
            StandardGate::Z => Self::z(),
            StandardGate::H => Self::h(),
            StandardGate::S => Self::p(PI / 2.0),
            StandardGate::Sdg => Self::p(-PI / 2.0),
            StandardGate::T => Self::p(PI / 4.0),
            StandardGate::Tdg => Self::p(-PI / 4.0),
            StandardGate::SX => Self::sx(),
            StandardGate::SXdg => Self::sxdg(),
            StandardGate::Rx(t) => Self::rx(t.as_f64()?),
            StandardGate::Ry(t) => Self::ry(t.as_f64()?),
            StandardGate::Rz(t) => Self::rz(t.as_f64()?),
            StandardGate::P(t) => Self::p(t.as_f64()?),
            StandardGate::U(theta, phi, lambda) => {
                Self::u(theta.as_f64()?, phi.as_f64()?, lambda.as_f64()?)
            }
            StandardGate::CX | StandardGate::CZ | StandardGate::ECR | StandardGate::Swap => {
                return None;
            }
        };
        Some(m)
    }

    /// Matrix product `self * other`.
    #[allow(clippy::many_single_char_names)]
    pub fn mul(&self, other: &Self) -> Self {
        let [a, b, c, d] = self.data;
        let [e, f, g, h] = other.data;
        Self::new(a * e + b * g, a * f + b * h, c * e + d * g, c * f + d * h)
    }

    pub fn dagger(&self) -> Self {
        Self::new(
            self.data[0].conj(),
            self.data[2].conj(),
            self.data[1].conj(),
            self.data[3].conj(),
        )
    }

    /// Whether `self` and `other` differ only by a global phase.
    pub fn equiv_up_to_phase(&self, other: &Self) -> bool {
        let m = self.dagger().mul(other);
        let trace = m.data[0] + m.data[3];
        (trace.norm() - 2.0).abs() < 1e-9
    }

    pub fn is_identity(&self) -> bool {
        self.equiv_up_to_phase(&Self::identity())
    }

    /// ZYZ Euler decomposition: `U = e^{iφ} Rz(α) Ry(β) Rz(γ)`.
    ///
    /// Returns `(α, β, γ, φ)` with `β` in `[0, π]`.
    pub fn zyz_decomposition(&self) -> (f64, f64, f64, f64) {
        let [a, b, c, d] = self.data;

        let det = a * d - b * c;
        let global_phase = det.arg() / 2.0;

        // Strip the phase to land in SU(2):
        // [[cos(β/2)e^{-i(α+γ)/2}, -sin(β/2)e^{-i(α-γ)/2}],
        //  [sin(β/2)e^{i(α-γ)/2},   cos(β/2)e^{i(α+γ)/2}]]
        let phase_factor = Complex64::from_polar(1.0, -global_phase);
        let a = a * phase_factor;
        let b = b * phase_factor;
        let c = c * phase_factor;

        // atan2 stays exact near β = 0, where acos(|a|) loses half the digits.
        let beta = 2.0 * c.norm().atan2(a.norm());

        if beta.abs() < EPSILON {
            let alpha_plus_gamma = -2.0 * a.arg();
            return (alpha_plus_gamma / 2.0, 0.0, alpha_plus_gamma / 2.0, global_phase);
        }

        if (beta - PI).abs() < EPSILON {
            let alpha_minus_gamma = -2.0 * (-b).arg();
            return (alpha_minus_gamma / 2.0, PI, -alpha_minus_gamma / 2.0, global_phase);
        }

        let alpha_plus_gamma = -2.0 * a.arg();
        let alpha_minus_gamma = 2.0 * c.arg();
        let alpha = f64::midpoint(alpha_plus_gamma, alpha_minus_gamma);
        let gamma = (alpha_plus_gamma - alpha_minus_gamma) / 2.0;

        (alpha, beta, gamma, global_phase)
    }

    /// Parameters `(θ, φ, λ)` of a `U` gate equal to `self` up to phase.
    pub fn to_u_params(&self) -> (f64, f64, f64) {
        let (alpha, beta, gamma, _) = self.zyz_decomposition();
        (beta, normalize_angle(alpha), normalize_angle(gamma))
    }

    /// Equivalent `rz`/`sx`/`x` sequence in time order, up to global phase.
    ///
    /// Uses `Rz(α)Ry(β)Rz(γ) ≅ Rz(α+π)·SX·Rz(β+π)·SX·Rz(γ)` in general,
    /// with shorter forms for `β = 0`, `β = π/2` and `β = π`. Rotations that
    /// normalize to zero are dropped.
    pub fn zsx_sequence(&self) -> Vec<ZsxStep> {
        let (alpha, beta, gamma, _) = self.zyz_decomposition();

        let steps = if beta.abs() < EPSILON {
            vec![ZsxStep::Rz(alpha + gamma)]
        } else if (beta - PI / 2.0).abs() < EPSILON {
            vec![
                ZsxStep::Rz(gamma - PI / 2.0),
                ZsxStep::Sx,
                ZsxStep::Rz(alpha + PI / 2.0),
            ]
        } else if (beta - PI).abs() < EPSILON {
            // Rz(α)·X = X·Rz(-α), so the whole thing folds into one rotation.
            vec![ZsxStep::Rz(gamma - alpha - PI), ZsxStep::X]
        } else {
            vec![
                ZsxStep::Rz(gamma),
                ZsxStep::Sx,
                ZsxStep::Rz(beta + PI),
                ZsxStep::Sx,
                ZsxStep::Rz(alpha + PI),
            ]
        };

        steps
            .into_iter()
            .filter_map(|step| match step {
                ZsxStep::Rz(theta) => {
                    let theta = normalize_angle(theta);
                    (theta.abs() > EPSILON).then_some(ZsxStep::Rz(theta))
                }
                other => Some(other),
            })
            .collect()
    }
}

/// Normalize an angle to `(-π, π]`. Non-finite input maps to zero.
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let mut a = angle.rem_euclid(2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    }
    if a.abs() < EPSILON { 0.0 } else { a }
}

impl Default for Unitary2x2 {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Unitary2x2 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Unitary2x2::mul(&self, &rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn replay(steps: &[ZsxStep]) -> Unitary2x2 {
        steps.iter().fold(Unitary2x2::identity(), |acc, step| {
            let m = match step {
                ZsxStep::Rz(t) => Unitary2x2::rz(*t),
                ZsxStep::Sx => Unitary2x2::sx(),
                ZsxStep::X => Unitary2x2::x(),
            };
            m * acc
        })
    }

    #[test]
    fn test_involutions() {
        for m in [Unitary2x2::h(), Unitary2x2::x(), Unitary2x2::y(), Unitary2x2::z()] {
            assert!((m * m).is_identity());
        }
        assert!((Unitary2x2::sx() * Unitary2x2::sxdg()).is_identity());
    }

    #[test]
    fn test_sx_squared_is_x() {
        assert!((Unitary2x2::sx() * Unitary2x2::sx()).equiv_up_to_phase(&Unitary2x2::x()));
    }

    #[test]
    fn test_zyz_reconstructs_hadamard() {
        let h = Unitary2x2::h();
        let (alpha, beta, gamma, phase) = h.zyz_decomposition();
        let rebuilt = Unitary2x2::rz(alpha) * Unitary2x2::ry(beta) * Unitary2x2::rz(gamma);
        let global = Complex64::from_polar(1.0, phase);
        for i in 0..4 {
            assert!((h.data[i] - rebuilt.data[i] * global).norm() < 1e-9);
        }
    }

    #[test]
    fn test_hadamard_zsx_form() {
        let steps = Unitary2x2::h().zsx_sequence();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1], ZsxStep::Sx);
        assert!(replay(&steps).equiv_up_to_phase(&Unitary2x2::h()));
    }

    #[test]
    fn test_x_is_a_single_step() {
        assert_eq!(Unitary2x2::x().zsx_sequence(), vec![ZsxStep::X]);
    }

    #[test]
    fn test_identity_is_empty() {
        assert!(Unitary2x2::identity().zsx_sequence().is_empty());
        assert!((Unitary2x2::rz(0.4) * Unitary2x2::rz(-0.4)).zsx_sequence().is_empty());
    }

    #[test]
    fn test_u_params_roundtrip() {
        let m = Unitary2x2::h() * Unitary2x2::p(PI / 4.0);
        let (theta, phi, lambda) = m.to_u_params();
        assert!(Unitary2x2::u(theta, phi, lambda).equiv_up_to_phase(&m));
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert_eq!(normalize_angle(2.0 * PI), 0.0);
        assert_eq!(normalize_angle(f64::NAN), 0.0);
        assert!((normalize_angle(PI) - PI).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn zsx_sequence_matches_u(theta in 0.0..PI, phi in -PI..PI, lambda in -PI..PI) {
            let m = Unitary2x2::u(theta, phi, lambda);
            prop_assert!(replay(&m.zsx_sequence()).equiv_up_to_phase(&m));
        }
    }
}
