use mlua::{Lua, LuaOptions, LuaSerdeExt, StdLib};
use wirecore::{LogWriter, NodeError};

/// Bindings exposed to a script evaluation: the message (as plain JSON) and,
/// for function nodes, a `log` callable.
pub struct ScriptBindings {
    pub msg: serde_json::Value,
    pub log: Option<LogWriter>,
}

impl ScriptBindings {
    pub fn msg_only(msg: serde_json::Value) -> Self {
        Self { msg, log: None }
    }

    pub fn with_log(msg: serde_json::Value, log: LogWriter) -> Self {
        Self {
            msg,
            log: Some(log),
        }
    }
}

/// Seam for user-supplied transformation/predicate logic. The engine core
/// never depends on a specific scripting runtime; implementations must give
/// the code an isolated scope containing only the bindings.
pub trait ScriptEngine: Send + Sync {
    fn evaluate(&self, code: &str, bindings: ScriptBindings) -> Result<serde_json::Value, NodeError>;
}

/// Sandboxed Lua evaluator. Runs each evaluation in a fresh interpreter with
/// a restricted stdlib (math/string/table only — no os, io, package, or
/// debug), so scripts see nothing but `msg` and the optional `log` binding.
///
/// Evaluation is synchronous: the interpreter never lives across an await
/// point, keeping node futures `Send`.
pub struct LuaScriptEngine;

impl LuaScriptEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LuaScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine for LuaScriptEngine {
    fn evaluate(&self, code: &str, bindings: ScriptBindings) -> Result<serde_json::Value, NodeError> {
        let lua = Lua::new_with(
            StdLib::MATH | StdLib::STRING | StdLib::TABLE,
            LuaOptions::default(),
        )
        .map_err(|e| NodeError::Script(format!("interpreter init failed: {}", e)))?;

        let globals = lua.globals();
        let msg = lua
            .to_value(&bindings.msg)
            .map_err(|e| NodeError::Script(format!("binding 'msg' failed: {}", e)))?;
        globals
            .set("msg", msg)
            .map_err(|e| NodeError::Script(e.to_string()))?;

        if let Some(writer) = bindings.log {
            let log_fn = lua
                .create_function(move |_, text: String| {
                    writer.info(text);
                    Ok(())
                })
                .map_err(|e| NodeError::Script(e.to_string()))?;
            globals
                .set("log", log_fn)
                .map_err(|e| NodeError::Script(e.to_string()))?;
        }

        let value = lua
            .load(code)
            .eval::<mlua::Value>()
            .map_err(|e| NodeError::Script(e.to_string()))?;

        lua.from_value(value)
            .map_err(|e| NodeError::Script(format!("result not convertible: {}", e)))
    }
}
