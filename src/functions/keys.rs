//! Adding, removing and renaming keys.

use super::{Args, CallContext, FuncError, Function, Param};
use crate::record::MESSAGE_KEY;

const ADD_KEY_PARAMS: &[Param] = &[Param::required("key"), Param::required("value")];
const KEY_PARAMS: &[Param] = &[Param::required("key")];
const RENAME_PARAMS: &[Param] = &[Param::required("new_key"), Param::required("old_key")];
const NULLIF_PARAMS: &[Param] = &[Param::required("key"), Param::required("value")];

/// `add_key(key, value)`: unconditionally set a literal value.
pub struct AddKey;

impl Function for AddKey {
    fn name(&self) -> &'static str {
        "add_key"
    }

    fn params(&self) -> &'static [Param] {
        ADD_KEY_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Set `key` to a literal string, number, bool or nil."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let value = args.literal(1)?;
        ctx.record.set(key, value);
        Ok(())
    }
}

/// `drop_key(key)`
pub struct DropKey;

impl Function for DropKey {
    fn name(&self) -> &'static str {
        "drop_key"
    }

    fn params(&self) -> &'static [Param] {
        KEY_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Remove `key` from the record."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        ctx.record.delete(&key);
        Ok(())
    }
}

/// `drop_origin_data()`
pub struct DropOriginData;

impl Function for DropOriginData {
    fn name(&self) -> &'static str {
        "drop_origin_data"
    }

    fn params(&self) -> &'static [Param] {
        &[]
    }

    fn summary(&self) -> &'static str {
        "Remove the `message` key holding the raw input."
    }

    fn call(&self, _args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        ctx.record.delete(MESSAGE_KEY);
        Ok(())
    }
}

/// `rename(new_key, old_key)`
pub struct Rename;

impl Function for Rename {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn params(&self) -> &'static [Param] {
        RENAME_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Move the value of `old_key` to `new_key`."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let new_key = args.key(0)?;
        let old_key = args.key(1)?;
        if new_key == old_key {
            return Ok(());
        }

        let value = ctx.value(&old_key)?.clone();
        ctx.record.set(new_key, value);
        ctx.record.delete(&old_key);
        Ok(())
    }
}

/// `nullif(key, value)`: delete `key` when it holds exactly `value`.
pub struct NullIf;

impl Function for NullIf {
    fn name(&self) -> &'static str {
        "nullif"
    }

    fn params(&self) -> &'static [Param] {
        NULLIF_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Remove `key` if its value equals the literal `value` (same type and value)."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let expected = args.literal(1)?;

        if *ctx.value(&key)? == expected {
            ctx.record.delete(&key);
        }
        Ok(())
    }
}
