//! Source Emitter
//!
//! Translates a validator unit into a Rust module that rebuilds each field's
//! resolved shapes and calls the runtime check routines.

use indexmap::{IndexMap, IndexSet};

use crate::backend::codegen::UnitEmitter;
use crate::backend::{FieldBucket, FieldRoutine, ValidatorUnit};
use crate::types::{Precondition, ResolvedShape, Shape};
use crate::utils::Result;

/// Rust source emitter
pub struct SourceEmitter {
    /// Path the generated code imports the runtime from
    crate_path: String,
    output: String,
    indent: usize,
    /// Field name to its routine's function name, for the current unit
    functions: IndexMap<String, String>,
}

impl Default for SourceEmitter {
    fn default() -> Self {
        Self::new("shapecheck")
    }
}

impl SourceEmitter {
    pub fn new(crate_path: &str) -> Self {
        Self {
            crate_path: crate_path.to_string(),
            output: String::new(),
            indent: 0,
            functions: IndexMap::new(),
        }
    }

    /// Write indented line
    fn writeln(&mut self, line: &str) {
        if !line.is_empty() {
            for _ in 0..self.indent {
                self.output.push_str("    ");
            }
        }
        self.output.push_str(line);
        self.output.push('\n');
    }

    fn shape_expr(&self, shape: &Shape) -> String {
        match shape {
            Shape::Any => "Shape::Any".to_string(),
            Shape::Atom(name) => format!("Shape::atom({:?})", name),
            Shape::AnyAtom => "Shape::AnyAtom".to_string(),
            Shape::Integer(n) => format!("Shape::Integer({})", n),
            Shape::IntRange(lo, hi) => format!("Shape::IntRange({}, {})", lo, hi),
            Shape::AnyInteger => "Shape::AnyInteger".to_string(),
            Shape::PosInteger => "Shape::PosInteger".to_string(),
            Shape::NonNegInteger => "Shape::NonNegInteger".to_string(),
            Shape::NegInteger => "Shape::NegInteger".to_string(),
            Shape::Float => "Shape::Float".to_string(),
            Shape::Bitstring { size, unit } => format!("Shape::Bitstring {{ size: {}, unit: {} }}", size, unit),
            Shape::Pid => "Shape::Pid".to_string(),
            Shape::Port => "Shape::Port".to_string(),
            Shape::Reference => "Shape::Reference".to_string(),
            Shape::EmptyList => "Shape::EmptyList".to_string(),
            Shape::List { elem, non_empty } => format!(
                "Shape::List {{ elem: Box::new({}), non_empty: {} }}",
                self.shape_expr(elem),
                non_empty
            ),
            Shape::EmptyMap => "Shape::EmptyMap".to_string(),
            Shape::Map { key, value } => format!(
                "Shape::Map {{ key: Box::new({}), value: Box::new({}) }}",
                self.shape_expr(key),
                self.shape_expr(value)
            ),
            Shape::MapFields(fields) => {
                let entries: Vec<String> = fields
                    .iter()
                    .map(|(name, shape)| format!("({:?}.to_string(), {})", name, self.shape_expr(shape)))
                    .collect();
                format!("Shape::MapFields(vec![{}])", entries.join(", "))
            }
            Shape::EmptyTuple => "Shape::EmptyTuple".to_string(),
            Shape::AnyTuple => "Shape::AnyTuple".to_string(),
            Shape::Tuple(elems) => {
                let elems: Vec<String> = elems.iter().map(|e| self.shape_expr(e)).collect();
                format!("Shape::Tuple(vec![{}])", elems.join(", "))
            }
            Shape::Function { arity: Some(n) } => format!("Shape::Function {{ arity: Some({}) }}", n),
            Shape::Function { arity: None } => "Shape::Function { arity: None }".to_string(),
            Shape::Record(module) => format!("Shape::Record({:?}.to_string())", module),
            Shape::Guarded { shape, precondition } => format!(
                "Shape::Guarded {{ shape: Box::new({}), precondition: {} }}",
                self.shape_expr(shape),
                self.precondition_expr(precondition)
            ),
        }
    }

    fn precondition_expr(&self, precondition: &Precondition) -> String {
        format!(
            "Precondition::new({:?}, {:?}, {:?}, PredicateRef::new({:?}))",
            precondition.owner_module, precondition.type_name, precondition.description, precondition.predicate.0
        )
    }

    fn resolved_expr(&self, resolved: &ResolvedShape) -> String {
        match &resolved.precondition {
            Some(pre) => format!(
                "ResolvedShape::with({}, Some({}))",
                self.shape_expr(&resolved.shape),
                self.precondition_expr(pre)
            ),
            None => format!("ResolvedShape::plain({})", self.shape_expr(&resolved.shape)),
        }
    }

    fn emit_buckets(&mut self, unit: &ValidatorUnit) {
        for bucket in FieldBucket::ALL {
            let names: Vec<String> = unit.fields(bucket).iter().map(|n| format!("{:?}", n)).collect();
            let line = format!(
                "pub const {}_FIELDS: &[&str] = &[{}];",
                bucket.name().to_uppercase(),
                names.join(", ")
            );
            self.writeln(&line);
        }
    }

    fn function(&self, field: &str) -> String {
        self.functions
            .get(field)
            .cloned()
            .unwrap_or_else(|| format!("check_{}", identifier(field)))
    }

    fn emit_field(&mut self, field: &str, routine: &FieldRoutine) {
        let function = self.function(field);
        match routine {
            FieldRoutine::Skip => {
                self.writeln(&format!("/// {} :: any()", field));
                self.writeln(&format!(
                    "pub fn {}(_value: &Value, _ctx: &ValidationContext<'_>) -> Result<(), ValidationError> {{",
                    function
                ));
                self.indent += 1;
                self.writeln("Ok(())");
            }
            FieldRoutine::Single(resolved) => {
                self.writeln(&format!("/// {} :: {}", field, resolved));
                self.writeln(&format!(
                    "pub fn {}(value: &Value, ctx: &ValidationContext<'_>) -> Result<(), ValidationError> {{",
                    function
                ));
                self.indent += 1;
                let expr = self.resolved_expr(resolved);
                self.writeln(&format!("check_single({:?}, value, &{}, ctx)", field, expr));
            }
            FieldRoutine::Alternatives(alternatives) => {
                let rendered: Vec<String> = alternatives.iter().map(ToString::to_string).collect();
                self.writeln(&format!("/// {} :: {}", field, rendered.join(" | ")));
                self.writeln(&format!(
                    "pub fn {}(value: &Value, ctx: &ValidationContext<'_>) -> Result<(), ValidationError> {{",
                    function
                ));
                self.indent += 1;
                self.writeln("let alternatives = [");
                self.indent += 1;
                for alternative in alternatives {
                    let expr = self.resolved_expr(alternative);
                    self.writeln(&format!("{},", expr));
                }
                self.indent -= 1;
                self.writeln("];");
                self.writeln(&format!("check_alternatives({:?}, value, &alternatives, ctx)", field));
            }
        }
        self.indent -= 1;
        self.writeln("}");
        self.writeln("");
    }

    fn emit_precondition(&mut self, unit: &ValidatorUnit) {
        self.writeln("/// Record-level precondition, run after every field passed");
        match unit.precondition() {
            Some(pre) => {
                self.writeln(
                    "pub fn check_precondition(record: &Value, ctx: &ValidationContext<'_>) -> Result<(), ValidationError> {",
                );
                self.indent += 1;
                let expr = self.precondition_expr(pre);
                self.writeln(&format!("check_record_precondition(record, &{}, ctx)", expr));
            }
            None => {
                self.writeln(
                    "pub fn check_precondition(_record: &Value, _ctx: &ValidationContext<'_>) -> Result<(), ValidationError> {",
                );
                self.indent += 1;
                self.writeln("Ok(())");
            }
        }
        self.indent -= 1;
        self.writeln("}");
        self.writeln("");
    }

    fn emit_dispatch(&mut self, unit: &ValidatorUnit) {
        self.writeln("/// Run the routine for `field`, None if the record has no such field");
        self.writeln(
            "pub fn check_field(field: &str, value: &Value, ctx: &ValidationContext<'_>) -> Option<Result<(), ValidationError>> {",
        );
        self.indent += 1;
        self.writeln("match field {");
        self.indent += 1;
        for (field, _) in unit.routines() {
            let function = self.function(field);
            self.writeln(&format!("{:?} => Some({}(value, ctx)),", field, function));
        }
        self.writeln("_ => None,");
        self.indent -= 1;
        self.writeln("}");
        self.indent -= 1;
        self.writeln("}");
    }

    /// Generate the complete listing
    pub fn generate_source(&mut self, unit: &ValidatorUnit) -> Result<String> {
        self.output.clear();
        self.indent = 0;
        self.functions = function_names(unit);

        match &unit.file {
            Some(file) => self.writeln(&format!("// Generated by shapec from {}. Do not edit.", file)),
            None => self.writeln("// Generated by shapec. Do not edit."),
        }
        self.writeln(&format!("//! Validator for {}", unit.module));
        self.writeln("");
        self.writeln("#![allow(unused_imports)]");
        self.writeln("");
        self.writeln(&format!(
            "use {}::runtime::{{check_alternatives, check_record_precondition, check_single, ValidationContext, ValidationError, Value}};",
            self.crate_path
        ));
        self.writeln(&format!(
            "use {}::types::{{Precondition, PredicateRef, ResolvedShape, Shape}};",
            self.crate_path
        ));
        self.writeln("");
        self.writeln(&format!("pub const MODULE: &str = {:?};", unit.module));
        self.writeln("");
        self.emit_buckets(unit);
        self.writeln("");

        for (field, routine) in unit.routines() {
            self.emit_field(field, routine);
        }
        self.emit_precondition(unit);
        self.emit_dispatch(unit);

        Ok(self.output.clone())
    }

    /// Get the last generated listing
    pub fn source(&self) -> &str {
        &self.output
    }
}

impl UnitEmitter for SourceEmitter {
    fn emit(&mut self, unit: &ValidatorUnit) -> Result<String> {
        self.generate_source(unit)
    }

    fn extension(&self) -> &str {
        "rs"
    }

    fn name(&self) -> &str {
        "Rust source"
    }
}

/// Field name as a Rust identifier fragment
fn identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// One distinct function per field; `a-b` and `a_b` become `check_a_b` and `check_a_b_2`
fn function_names(unit: &ValidatorUnit) -> IndexMap<String, String> {
    let mut taken: IndexSet<String> = ["check_precondition", "check_field"]
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut names = IndexMap::new();
    for (field, _) in unit.routines() {
        let base = format!("check_{}", identifier(field));
        let mut name = base.clone();
        let mut n = 2;
        while taken.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        taken.insert(name.clone());
        names.insert(field.to_string(), name);
    }
    names
}

/// `Shop.LineItem` -> `shop_line_item`
pub fn unit_file_stem(module: &str) -> String {
    let mut stem = String::new();
    for (i, segment) in module.split('.').enumerate() {
        if i > 0 {
            stem.push('_');
        }
        for (j, c) in segment.chars().enumerate() {
            if c.is_ascii_uppercase() {
                if j > 0 {
                    stem.push('_');
                }
                stem.push(c.to_ascii_lowercase());
            } else if c.is_ascii_alphanumeric() || c == '_' {
                stem.push(c);
            } else {
                stem.push('_');
            }
        }
    }
    stem
}
