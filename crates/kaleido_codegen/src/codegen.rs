// crates/kaleido_codegen/src/codegen.rs
//
// AST -> Cranelift IR for one function at a time.
//
// Generation runs in two passes. The first resolves every name the body uses
// and reports any recoverable error before the backend hears of the function.
// The second emits IR, verifies it, and defines it in the open unit. A
// function that fails either pass leaves nothing behind in the unit.

use crate::error::{CodegenError, CodegenResult};
use crate::manager::UnitManager;
use crate::names;
use crate::unit::float_signature;
use cranelift_codegen::ir::condcodes::FloatCC;
use cranelift_codegen::ir::{types, InstBuilder, UserFuncName, Value};
use cranelift_codegen::Context;
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::JITModule;
use cranelift_module::{FuncId, Linkage, Module};
use kaleido_frontend::{Expr, Function, Prototype};
use std::collections::HashMap;

/// Handle to a function defined in some unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFunction {
    /// Source name; empty for a top-level expression.
    pub name: String,
    pub symbol: String,
    pub arity: usize,
}

impl CompiledFunction {
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Code Generator State
// ─────────────────────────────────────────────────────────────────────────────

pub struct Codegen {
    ctx: Context,
    builder_ctx: FunctionBuilderContext,
    /// Parameter name -> SSA value, valid while one function is generated.
    variables: HashMap<String, Value>,
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new()
    }
}

impl Codegen {
    pub fn new() -> Self {
        Self {
            ctx: Context::new(),
            builder_ctx: FunctionBuilderContext::new(),
            variables: HashMap::new(),
        }
    }

    /// Compiles `func` into the open unit of `units`.
    pub fn generate(
        &mut self,
        func: &Function,
        units: &mut UnitManager,
    ) -> CodegenResult<CompiledFunction> {
        self.variables.clear();

        let proto = &func.proto;
        let symbol = units.symbol_for(&proto.name);
        let arity = proto.arity();
        units.check_definition(&proto.name, &symbol, arity)?;

        let mut callees = HashMap::new();
        resolve_expr(&func.body, proto, &symbol, units, &mut callees)?;

        let open = units.open_unit();
        let func_id = open
            .declare(&proto.name, &symbol, arity, Linkage::Export)?
            .func_id;
        if !proto.is_anonymous() {
            callees.insert(proto.name.clone(), func_id);
        }

        self.ctx.func.signature = float_signature(&open.module, arity);
        self.ctx.func.name = UserFuncName::user(0, func_id.as_u32());

        let emitted = self.emit_body(func, &mut open.module, &callees);
        if let Err(e) = emitted {
            self.ctx.clear();
            return Err(e);
        }

        if let Err(errors) = cranelift_codegen::verify_function(&self.ctx.func, open.module.isa()) {
            self.ctx.clear();
            return Err(CodegenError::Verifier {
                function: symbol,
                message: errors.to_string(),
            });
        }

        if units.config().print_ir {
            eprintln!("; {} ({})\n{}", symbol, display_name(proto), self.ctx.func.display());
        }

        let open = units.open_unit();
        let defined = open.module.define_function(func_id, &mut self.ctx);
        self.ctx.clear();
        defined?;
        open.mark_defined(&symbol);

        Ok(CompiledFunction {
            name: proto.name.clone(),
            symbol,
            arity,
        })
    }

    fn emit_body(
        &mut self,
        func: &Function,
        module: &mut JITModule,
        callees: &HashMap<String, FuncId>,
    ) -> CodegenResult<()> {
        let mut builder = FunctionBuilder::new(&mut self.ctx.func, &mut self.builder_ctx);
        let entry = builder.create_block();
        builder.append_block_params_for_function_params(entry);
        builder.switch_to_block(entry);
        builder.seal_block(entry);

        let params = builder.block_params(entry).to_vec();
        for (name, value) in func.proto.params.iter().zip(params) {
            self.variables.insert(name.clone(), value);
        }

        let mut translator = FunctionTranslator {
            builder,
            module,
            variables: &self.variables,
            callees,
        };
        let ret = translator.translate_expr(&func.body)?;
        translator.builder.ins().return_(&[ret]);
        translator.builder.finalize();
        Ok(())
    }
}

fn display_name(proto: &Prototype) -> &str {
    if proto.is_anonymous() {
        "<anonymous>"
    } else {
        &proto.name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolution pass
// ─────────────────────────────────────────────────────────────────────────────

/// Checks every variable, operator and call in `expr`, collecting the
/// open-unit function id of each callee.
fn resolve_expr(
    expr: &Expr,
    proto: &Prototype,
    own_symbol: &str,
    units: &mut UnitManager,
    callees: &mut HashMap<String, FuncId>,
) -> CodegenResult<()> {
    match expr {
        Expr::Number(_) => Ok(()),
        Expr::Variable(name) => {
            if proto.params.contains(name) {
                Ok(())
            } else {
                Err(CodegenError::UnknownVariable(name.clone()))
            }
        }
        Expr::Binary { op, lhs, rhs } => {
            resolve_expr(lhs, proto, own_symbol, units, callees)?;
            resolve_expr(rhs, proto, own_symbol, units, callees)?;
            match op {
                '+' | '-' | '*' | '<' => Ok(()),
                other => Err(CodegenError::InvalidOperator(*other)),
            }
        }
        Expr::Call { callee, args } => {
            let symbol = names::legalize(callee);
            let expected = if symbol == own_symbol {
                proto.arity()
            } else {
                let decl = units
                    .find_declaration(&symbol)?
                    .ok_or_else(|| CodegenError::UnknownFunction(callee.clone()))?;
                callees.insert(callee.clone(), decl.func_id);
                decl.arity
            };

            if expected != args.len() {
                return Err(CodegenError::ArityMismatch {
                    name: callee.clone(),
                    expected,
                    found: args.len(),
                });
            }

            for arg in args {
                resolve_expr(arg, proto, own_symbol, units, callees)?;
            }
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Emission pass
// ─────────────────────────────────────────────────────────────────────────────

struct FunctionTranslator<'a> {
    builder: FunctionBuilder<'a>,
    module: &'a mut JITModule,
    variables: &'a HashMap<String, Value>,
    callees: &'a HashMap<String, FuncId>,
}

impl FunctionTranslator<'_> {
    fn translate_expr(&mut self, expr: &Expr) -> CodegenResult<Value> {
        match expr {
            Expr::Number(n) => Ok(self.builder.ins().f64const(*n)),
            Expr::Variable(name) => self
                .variables
                .get(name)
                .copied()
                .ok_or_else(|| CodegenError::UnknownVariable(name.clone())),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.translate_expr(lhs)?;
                let rhs = self.translate_expr(rhs)?;
                self.translate_binary(*op, lhs, rhs)
            }
            Expr::Call { callee, args } => {
                let func_id = *self
                    .callees
                    .get(callee)
                    .ok_or_else(|| CodegenError::UnknownFunction(callee.clone()))?;
                let local = self.module.declare_func_in_func(func_id, self.builder.func);

                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.translate_expr(arg)?);
                }
                let call = self.builder.ins().call(local, &values);
                Ok(self.builder.inst_results(call)[0])
            }
        }
    }

    fn translate_binary(&mut self, op: char, lhs: Value, rhs: Value) -> CodegenResult<Value> {
        let ins = self.builder.ins();
        match op {
            '+' => Ok(ins.fadd(lhs, rhs)),
            '-' => Ok(ins.fsub(lhs, rhs)),
            '*' => Ok(ins.fmul(lhs, rhs)),
            '<' => {
                let flag = ins.fcmp(FloatCC::LessThan, lhs, rhs);
                let wide = self.builder.ins().uextend(types::I32, flag);
                Ok(self.builder.ins().fcvt_from_sint(types::F64, wide))
            }
            other => Err(CodegenError::InvalidOperator(other)),
        }
    }
}
