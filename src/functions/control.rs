use super::{Args, CallContext, FuncError, Function, Param};

/// `drop()`: mark the record for discarding. Later statements still run.
pub struct DropRecord;

impl Function for DropRecord {
    fn name(&self) -> &'static str {
        "drop"
    }

    fn params(&self) -> &'static [Param] {
        &[]
    }

    fn summary(&self) -> &'static str {
        "Mark the record as dropped; the caller should discard it."
    }

    fn call(&self, _args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        ctx.control.dropped = true;
        Ok(())
    }
}

/// `exit()`
pub struct Exit;

impl Function for Exit {
    fn name(&self) -> &'static str {
        "exit"
    }

    fn params(&self) -> &'static [Param] {
        &[]
    }

    fn summary(&self) -> &'static str {
        "Stop running the script; the record is kept as it is."
    }

    fn call(&self, _args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        ctx.control.exit = true;
        Ok(())
    }
}
