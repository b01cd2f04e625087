//! OpenQASM 3 emitter.

use std::f64::consts::PI;

use qpush_ir::{
    Circuit, ClbitId, GateKind, Instruction, InstructionKind, ParameterExpression, QubitId,
};

use crate::error::{EmitError, EmitResult};

/// Register name used for classical bits declared outside any register.
const DEFAULT_CREG: &str = "c";

/// Knobs for [`emit_with`].
#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    /// Add `include "stdgates.inc";` after the version line.
    pub include_stdgates: bool,
}

/// Emit a circuit as OpenQASM 3.0 source.
pub fn emit(circuit: &Circuit) -> EmitResult<String> {
    emit_with(circuit, &EmitOptions::default())
}

/// Emit a circuit as OpenQASM 3.0 source with explicit options.
///
/// All qubits live in a single register `q` whose width is one past the
/// highest qubit id, so physical circuits keep their device indices.
/// Classical bits keep their own registers (`measure_all` yields `meas`).
pub fn emit_with(circuit: &Circuit, options: &EmitOptions) -> EmitResult<String> {
    let mut emitter = Emitter::new(circuit);
    emitter.emit_circuit(circuit, options)
}

struct Emitter {
    output: String,
    /// Register name and index for every clbit, indexed by `ClbitId`.
    clbit_names: Vec<(String, u32)>,
    /// Classical registers in declaration order.
    cregs: Vec<(String, u32)>,
}

impl Emitter {
    fn new(circuit: &Circuit) -> Self {
        let mut clbit_names = Vec::with_capacity(circuit.num_clbits());
        let mut cregs: Vec<(String, u32)> = Vec::new();

        for clbit in circuit.clbits() {
            let (name, index) = match (&clbit.register, clbit.index) {
                (Some(reg), Some(idx)) => (reg.clone(), idx),
                _ => (DEFAULT_CREG.to_string(), clbit.id.0),
            };
            match cregs.iter_mut().find(|(n, _)| *n == name) {
                Some((_, size)) => *size = (*size).max(index + 1),
                None => cregs.push((name.clone(), index + 1)),
            }
            clbit_names.push((name, index));
        }

        Self {
            output: String::new(),
            clbit_names,
            cregs,
        }
    }

    fn emit_circuit(&mut self, circuit: &Circuit, options: &EmitOptions) -> EmitResult<String> {
        self.writeln("OPENQASM 3.0;");
        if options.include_stdgates {
            self.writeln("include \"stdgates.inc\";");
        }

        let width = circuit
            .dag()
            .qubits()
            .map(|q| q.index() + 1)
            .max()
            .unwrap_or(0);
        if width > 0 {
            self.writeln(&format!("qubit[{width}] q;"));
        }
        for (name, size) in self.cregs.clone() {
            self.writeln(&format!("bit[{size}] {name};"));
        }

        for (_, instruction) in circuit.dag().topological_ops() {
            self.emit_instruction(instruction)?;
        }

        Ok(std::mem::take(&mut self.output))
    }

    fn emit_instruction(&mut self, instruction: &Instruction) -> EmitResult<()> {
        match &instruction.kind {
            InstructionKind::Gate(gate) => {
                let params: Vec<ParameterExpression> = match &gate.kind {
                    GateKind::Standard(std) => std.parameters().into_iter().cloned().collect(),
                    GateKind::Custom(custom) => custom.params.clone(),
                };
                let rendered = params
                    .iter()
                    .map(|p| render_param(gate.name(), p))
                    .collect::<EmitResult<Vec<_>>>()?;
                let qubits = qubit_list(&instruction.qubits);

                if rendered.is_empty() {
                    self.writeln(&format!("{} {qubits};", gate.name()));
                } else {
                    self.writeln(&format!("{}({}) {qubits};", gate.name(), rendered.join(", ")));
                }
            }

            InstructionKind::Measure => {
                for (q, c) in instruction.qubits.iter().zip(&instruction.clbits) {
                    let target = self.clbit_ref(*c);
                    self.writeln(&format!("{target} = measure q[{}];", q.0));
                }
            }

            InstructionKind::Reset => {
                for q in &instruction.qubits {
                    self.writeln(&format!("reset q[{}];", q.0));
                }
            }

            InstructionKind::Barrier => {
                if instruction.qubits.is_empty() {
                    self.writeln("barrier;");
                } else {
                    self.writeln(&format!("barrier {};", qubit_list(&instruction.qubits)));
                }
            }
        }

        Ok(())
    }

    fn clbit_ref(&self, clbit: ClbitId) -> String {
        match self.clbit_names.get(clbit.index()) {
            Some((name, idx)) => format!("{name}[{idx}]"),
            None => format!("{DEFAULT_CREG}[{}]", clbit.0),
        }
    }

    fn writeln(&mut self, line: &str) {
        self.output.push_str(line);
        self.output.push('\n');
    }
}

fn qubit_list(qubits: &[QubitId]) -> String {
    qubits
        .iter()
        .map(|q| format!("q[{}]", q.0))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_param(gate: &str, param: &ParameterExpression) -> EmitResult<String> {
    let Some(value) = param.as_f64() else {
        return Err(EmitError::UnboundParameter {
            gate: gate.to_string(),
            symbol: param.first_symbol().unwrap_or_default().to_string(),
        });
    };
    if !value.is_finite() {
        return Err(EmitError::NonFiniteParameter {
            gate: gate.to_string(),
        });
    }
    Ok(format_angle(value))
}

/// Render an angle, preferring exact multiples of pi/8.
#[allow(clippy::cast_possible_truncation)]
fn format_angle(value: f64) -> String {
    if value.abs() < 1e-12 {
        return "0".into();
    }
    for denom in [1.0, 2.0, 4.0, 8.0] {
        let k = value * denom / PI;
        let rounded = k.round();
        if (k - rounded).abs() < 1e-9 {
            let numerator = match rounded as i64 {
                1 => "pi".to_string(),
                -1 => "-pi".to_string(),
                n => format!("{n}*pi"),
            };
            return if denom == 1.0 {
                numerator
            } else {
                format!("{numerator}/{denom}")
            };
        }
    }
    format!("{value}")
}
