use crate::compute::bytecode::{OpCode, Program};
use smallvec::SmallVec;

/// Runs a compiled program on a value stack.
///
/// Returns `None` only for a tape the compiler could not have produced
/// (operand underflow, or anything but one value left at the end).
/// Non-finite values are returned as-is; classifying them is the caller's job.
pub fn execute(program: &Program) -> Option<f64> {
    let mut stack: SmallVec<[f64; 16]> = SmallVec::with_capacity(program.max_stack);

    for &op in &program.ops {
        match op {
            OpCode::Push(v) => stack.push(v),
            OpCode::Neg => {
                let v = stack.pop()?;
                stack.push(-v);
            }
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Rem => {
                let r = stack.pop()?;
                let l = stack.pop()?;
                stack.push(apply(op, l, r));
            }
        }
    }

    match stack.as_slice() {
        [result] => Some(*result),
        _ => None,
    }
}

#[inline(always)]
fn apply(op: OpCode, l: f64, r: f64) -> f64 {
    match op {
        OpCode::Add => l + r,
        OpCode::Sub => l - r,
        OpCode::Mul => l * r,
        OpCode::Div => l / r,
        // Truncated remainder: the sign follows the dividend.
        OpCode::Rem => l % r,
        OpCode::Push(_) | OpCode::Neg => unreachable!("not a binary opcode"),
    }
}
