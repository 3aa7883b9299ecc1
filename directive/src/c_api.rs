//! Thin `extern "C"` surface for embedding the dispatcher in a non-Rust
//! host, built over the bundled reference collaborators since a
//! `DirectiveProcessor<L, M, E>` generic over caller-supplied trait
//! objects cannot itself cross an FFI boundary.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;

use crate::config::{Dialect, DirectiveConfig};
use crate::driver::DirectiveProcessor;
use crate::reference_impl::{ReferenceEvaluator, ReferenceExpander, ReferenceLexer};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

type Processor = DirectiveProcessor<ReferenceLexer, ReferenceExpander, ReferenceEvaluator>;

/// C-friendly configuration struct.
#[repr(C)]
#[allow(non_camel_case_types)]
pub struct directive_config {
    /// Dialect: 0=Traditional, 1=C89, 2=C99.
    pub dialect: c_int,
    /// Non-zero enables `-pedantic`-style diagnostics.
    pub pedantic: c_int,
    /// Macro/directive recursion limit.
    pub recursion_limit: usize,
}

#[allow(non_camel_case_types)]
pub type directive_config_t = directive_config;

fn set_last_error(message: &str) {
    LAST_ERROR.with(|error| {
        *error.borrow_mut() = CString::new(message).ok();
    });
}

fn config_from_c(config: &directive_config_t) -> Result<DirectiveConfig, &'static str> {
    let dialect = match config.dialect {
        0 => Dialect::Traditional,
        1 => Dialect::C89,
        2 => Dialect::C99,
        _ => return Err("invalid dialect value"),
    };
    if config.recursion_limit == 0 || config.recursion_limit > 10_000 {
        return Err("invalid recursion_limit");
    }
    Ok(DirectiveConfig::new()
        .with_dialect(dialect)
        .with_pedantic(config.pedantic != 0)
        .with_recursion_limit(config.recursion_limit))
}

/// Create a new dispatcher instance.
///
/// # Safety
/// Safe to call from C. A null `config` uses the default configuration.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn directive_new(config: *const directive_config_t) -> *mut Processor {
    let rust_config = if config.is_null() {
        DirectiveConfig::new()
    } else {
        let c_config = unsafe { &*config };
        match config_from_c(c_config) {
            Ok(c) => c,
            Err(e) => {
                set_last_error(e);
                return ptr::null_mut();
            }
        }
    };
    let proc = DirectiveProcessor::new(rust_config, ReferenceLexer, ReferenceExpander::new(), ReferenceEvaluator);
    Box::into_raw(Box::new(proc))
}

/// Free a dispatcher instance created by [`directive_new`].
///
/// # Safety
/// `proc` must have been created by [`directive_new`] and not already freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn directive_free(proc: *mut Processor) {
    if !proc.is_null() {
        unsafe {
            drop(Box::from_raw(proc));
        }
    }
}

/// Process `input` as file `file`, returning the emitted text.
///
/// # Safety
/// - `proc` must be a valid, non-freed pointer from [`directive_new`].
/// - `file` and `input` must point to valid null-terminated C strings.
/// - The returned string must be freed with [`directive_free_result`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn directive_process(
    proc: *mut Processor,
    file: *const c_char,
    input: *const c_char,
) -> *mut c_char {
    if proc.is_null() || file.is_null() || input.is_null() {
        return ptr::null_mut();
    }
    let file_str = match unsafe { CStr::from_ptr(file).to_str() } {
        Ok(s) => s,
        Err(_) => {
            set_last_error("file name is not valid UTF-8");
            return ptr::null_mut();
        }
    };
    let input_str = match unsafe { CStr::from_ptr(input).to_str() } {
        Ok(s) => s,
        Err(_) => {
            set_last_error("input is not valid UTF-8");
            return ptr::null_mut();
        }
    };
    let processor = unsafe { &mut *proc };
    match processor.process(file_str, input_str) {
        Ok(result) => match CString::new(result) {
            Ok(cstr) => cstr.into_raw(),
            Err(_) => {
                set_last_error("result contains an embedded NUL byte");
                ptr::null_mut()
            }
        },
        Err(e) => {
            set_last_error(&format!("{e}"));
            ptr::null_mut()
        }
    }
}

/// Get the last error message recorded on this thread.
///
/// # Safety
/// The returned string is valid until the next call on this thread that
/// sets a new error.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn directive_last_error() -> *const c_char {
    LAST_ERROR.with(|error| error.borrow().as_ref().map_or(ptr::null(), |s| s.as_ptr()))
}

/// Free a result string returned by [`directive_process`].
///
/// # Safety
/// `result` must have been returned by [`directive_process`] and not
/// already freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn directive_free_result(result: *mut c_char) {
    if !result.is_null() {
        unsafe {
            drop(CString::from_raw(result));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_and_free_roundtrip() {
        let proc = unsafe { directive_new(ptr::null()) };
        assert!(!proc.is_null());
        unsafe { directive_free(proc) };
    }

    #[test]
    fn invalid_dialect_reports_error() {
        let config = directive_config_t {
            dialect: 99,
            pedantic: 0,
            recursion_limit: 10,
        };
        let proc = unsafe { directive_new(&config) };
        assert!(proc.is_null());
    }

    #[test]
    fn process_round_trip_through_c_strings() {
        let proc = unsafe { directive_new(ptr::null()) };
        let file = CString::new("t.c").unwrap();
        let input = CString::new("#define FOO 1\nint x = FOO;\n").unwrap();
        let result = unsafe { directive_process(proc, file.as_ptr(), input.as_ptr()) };
        assert!(!result.is_null());
        let out = unsafe { CStr::from_ptr(result).to_str().unwrap() };
        assert!(out.contains("int x = 1;"));
        unsafe {
            directive_free_result(result);
            directive_free(proc);
        }
    }
}
