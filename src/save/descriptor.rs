//! Testcase filename descriptors.
//!
//! Every persisted file carries a description of the operation that produced
//! it: `(sync:<peer>,src:NNNNNN)` for synced cases, otherwise
//! `src:NNNNNN[+MMMMMM],time:T,op:<stage>[,pos:P[,val:[be:]±V] | ,rep:R]`,
//! optionally suffixed with `,+cov` (a never-seen edge) or `+partition`
//! (a new partition or cell slot without a new edge).

use std::fmt::Write as _;

use crate::bitmap::NewCoverage;
use crate::fatal;

/// Endianness tag for the `val:` component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageValType {
    #[default]
    None,
    LittleEndian,
    BigEndian,
}

/// Mutation-stage context the front end fills in before each execution.
/// The core only reads it when building filenames.
#[derive(Debug, Clone)]
pub struct OpContext {
    /// Peer name when importing a synced case.
    pub syncing_party: Option<String>,
    pub syncing_case: u32,
    /// Queue index of the input being mutated.
    pub current_entry: u32,
    /// Queue index of the splice partner, negative when not splicing.
    pub splicing_with: i64,
    /// Short name of the mutation stage.
    pub stage_short: String,
    /// Byte position the stage is working on; negative means the stage
    /// reports a repetition count instead.
    pub stage_cur_byte: i64,
    pub stage_cur_val: i64,
    pub stage_val_type: StageValType,
}

impl Default for OpContext {
    fn default() -> Self {
        OpContext {
            syncing_party: None,
            syncing_case: 0,
            current_entry: 0,
            splicing_with: -1,
            stage_short: "unknown".to_owned(),
            stage_cur_byte: -1,
            stage_cur_val: 0,
            stage_val_type: StageValType::None,
        }
    }
}

/// Builds the descriptor for a testcase about to be persisted.
///
/// `max_len` is the filename room left after the caller's prefix; blowing it
/// is fatal rather than truncated, a truncated descriptor would no longer
/// parse.
pub fn describe_op(
    ctx: &OpContext,
    run_time_ms: u64,
    new_bits: NewCoverage,
    new_partition: bool,
    max_len: usize,
) -> String {
    let mut ret = String::new();

    if let Some(party) = &ctx.syncing_party {
        let _ = write!(ret, "sync:{},src:{:06}", party, ctx.syncing_case);
    } else {
        let _ = write!(ret, "src:{:06}", ctx.current_entry);
        if ctx.splicing_with >= 0 {
            let _ = write!(ret, "+{:06}", ctx.splicing_with);
        }
        let _ = write!(ret, ",time:{}", run_time_ms);
        let _ = write!(ret, ",op:{}", ctx.stage_short);

        if ctx.stage_cur_byte >= 0 {
            let _ = write!(ret, ",pos:{}", ctx.stage_cur_byte);
            match ctx.stage_val_type {
                StageValType::None => {}
                StageValType::LittleEndian => {
                    let _ = write!(ret, ",val:{:+}", ctx.stage_cur_val);
                }
                StageValType::BigEndian => {
                    let _ = write!(ret, ",val:be:{:+}", ctx.stage_cur_val);
                }
            }
        } else {
            let _ = write!(ret, ",rep:{}", ctx.stage_cur_val);
        }
    }

    if new_bits == NewCoverage::NewEdges {
        ret.push_str(",+cov");
    } else if new_bits == NewCoverage::None && new_partition {
        ret.push_str("+partition");
    }

    if ret.len() >= max_len {
        fatal!("description string is too long ({} >= {max_len}): {ret}", ret.len());
    }

    ret
}
