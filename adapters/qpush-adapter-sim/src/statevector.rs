//! Statevector simulation engine.
//!
//! Amplitude index bit `k` is local qubit `k`. Two-qubit matrices are
//! written with the gate's first operand as the high bit.

use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_4};

use num_complex::Complex64;

use qpush_ir::{ParameterExpression, StandardGate};

use crate::error::{SimError, SimResult};

type Mat2 = [[Complex64; 2]; 2];
type Mat4 = [[Complex64; 4]; 4];

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);
const I: Complex64 = Complex64::new(0.0, 1.0);

fn angle(gate: &StandardGate, param: &ParameterExpression) -> SimResult<f64> {
    param.as_f64().ok_or_else(|| SimError::UnboundParameter {
        gate: gate.name().to_string(),
    })
}

fn diag(a: Complex64, b: Complex64) -> Mat2 {
    [[a, ZERO], [ZERO, b]]
}

fn u_matrix(theta: f64, phi: f64, lambda: f64) -> Mat2 {
    let (s, c) = (theta / 2.0).sin_cos();
    [
        [Complex64::from(c), -Complex64::from_polar(s, lambda)],
        [Complex64::from_polar(s, phi), Complex64::from_polar(c, phi + lambda)],
    ]
}

/// Matrix of a one-qubit gate.
fn one_qubit_matrix(gate: &StandardGate) -> SimResult<Mat2> {
    let h = Complex64::from(FRAC_1_SQRT_2);
    let m = match gate {
        StandardGate::I => diag(ONE, ONE),
        StandardGate::X => [[ZERO, ONE], [ONE, ZERO]],
        StandardGate::Y => [[ZERO, -I], [I, ZERO]],
        StandardGate::Z => diag(ONE, -ONE),
        StandardGate::H => [[h, h], [h, -h]],
        StandardGate::S => diag(ONE, I),
        StandardGate::Sdg => diag(ONE, -I),
        StandardGate::T => diag(ONE, Complex64::from_polar(1.0, FRAC_PI_4)),
        StandardGate::Tdg => diag(ONE, Complex64::from_polar(1.0, -FRAC_PI_4)),
        StandardGate::SX => {
            let (p, m) = (Complex64::new(0.5, 0.5), Complex64::new(0.5, -0.5));
            [[p, m], [m, p]]
        }
        StandardGate::SXdg => {
            let (p, m) = (Complex64::new(0.5, 0.5), Complex64::new(0.5, -0.5));
            [[m, p], [p, m]]
        }
        StandardGate::Rx(t) => {
            let (s, c) = (angle(gate, t)? / 2.0).sin_cos();
            [[c.into(), -I * s], [-I * s, c.into()]]
        }
        StandardGate::Ry(t) => {
            let (s, c) = (angle(gate, t)? / 2.0).sin_cos();
            [[c.into(), (-s).into()], [s.into(), c.into()]]
        }
        StandardGate::Rz(t) => {
            let t = angle(gate, t)?;
            diag(Complex64::from_polar(1.0, -t / 2.0), Complex64::from_polar(1.0, t / 2.0))
        }
        StandardGate::P(t) => diag(ONE, Complex64::from_polar(1.0, angle(gate, t)?)),
        StandardGate::U(t, p, l) => u_matrix(angle(gate, t)?, angle(gate, p)?, angle(gate, l)?),
        other => return Err(SimError::UnsupportedGate(other.name().to_string())),
    };
    Ok(m)
}

/// Matrix of a two-qubit gate, first operand as the high bit.
fn two_qubit_matrix(gate: &StandardGate) -> SimResult<Mat4> {
    let m = match gate {
        StandardGate::CX => [
            [ONE, ZERO, ZERO, ZERO],
            [ZERO, ONE, ZERO, ZERO],
            [ZERO, ZERO, ZERO, ONE],
            [ZERO, ZERO, ONE, ZERO],
        ],
        StandardGate::CZ => [
            [ONE, ZERO, ZERO, ZERO],
            [ZERO, ONE, ZERO, ZERO],
            [ZERO, ZERO, ONE, ZERO],
            [ZERO, ZERO, ZERO, -ONE],
        ],
        StandardGate::Swap => [
            [ONE, ZERO, ZERO, ZERO],
            [ZERO, ZERO, ONE, ZERO],
            [ZERO, ONE, ZERO, ZERO],
            [ZERO, ZERO, ZERO, ONE],
        ],
        StandardGate::ECR => {
            let s = Complex64::from(FRAC_1_SQRT_2);
            let si = I * FRAC_1_SQRT_2;
            [
                [ZERO, ZERO, s, si],
                [ZERO, ZERO, si, s],
                [s, -si, ZERO, ZERO],
                [-si, s, ZERO, ZERO],
            ]
        }
        other => return Err(SimError::UnsupportedGate(other.name().to_string())),
    };
    Ok(m)
}

/// A pure state over a handful of qubits.
pub(crate) struct Statevector {
    amplitudes: Vec<Complex64>,
}

impl Statevector {
    /// |0...0⟩ on `num_qubits` qubits.
    pub fn new(num_qubits: usize) -> Self {
        let mut amplitudes = vec![ZERO; 1 << num_qubits];
        amplitudes[0] = ONE;
        Self { amplitudes }
    }

    /// Apply a standard gate to local qubits.
    pub fn apply(&mut self, gate: &StandardGate, qubits: &[usize]) -> SimResult<()> {
        match qubits {
            [q] => self.apply_1q(*q, &one_qubit_matrix(gate)?),
            [a, b] => self.apply_2q(*a, *b, &two_qubit_matrix(gate)?),
            _ => return Err(SimError::UnsupportedGate(gate.name().to_string())),
        }
        Ok(())
    }

    fn apply_1q(&mut self, qubit: usize, m: &Mat2) {
        let mask = 1 << qubit;
        for i in 0..self.amplitudes.len() {
            if i & mask == 0 {
                let j = i | mask;
                let (a, b) = (self.amplitudes[i], self.amplitudes[j]);
                self.amplitudes[i] = m[0][0] * a + m[0][1] * b;
                self.amplitudes[j] = m[1][0] * a + m[1][1] * b;
            }
        }
    }

    fn apply_2q(&mut self, high: usize, low: usize, m: &Mat4) {
        let (hm, lm) = (1 << high, 1 << low);
        for i in 0..self.amplitudes.len() {
            if i & (hm | lm) != 0 {
                continue;
            }
            let idx = [i, i | lm, i | hm, i | hm | lm];
            let v = idx.map(|k| self.amplitudes[k]);
            for (row, &k) in idx.iter().enumerate() {
                self.amplitudes[k] = (0..4).map(|col| m[row][col] * v[col]).sum();
            }
        }
    }

    /// Probability of each basis state.
    pub fn probabilities(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.amplitudes
            .iter()
            .enumerate()
            .map(|(i, a)| (i, a.norm_sqr()))
    }
}
