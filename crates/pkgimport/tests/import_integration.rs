//! Integration tests for importing packages from the file system

use pkgimport::{
    object_string, FormatError, ImportConfig, ImportError, ObjectKind, Registry, SyncRegistry,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// An `ar` archive with the given members
fn archive(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = b"!<arch>\n".to_vec();
    for (name, body) in members {
        let header = format!(
            "{:<16}{:<12}{:<6}{:<6}{:<8}{:<10}`\n",
            name,
            0,
            0,
            0,
            644,
            body.len()
        );
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(b'\n');
        }
    }
    out
}

/// The package definition member holding textual export data
fn pkgdef(body: &str) -> Vec<u8> {
    format!("go object linux amd64 go1.6\n\n$$\n{body}$$\n").into_bytes()
}

fn write(dir: &Path, file: &str, bytes: &[u8]) {
    let path = dir.join(file);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, bytes).unwrap();
}

const MATH: &str = "package math\n\
    const Pi untyped float = 3.14159265358979323846264338327950288419716939937510582097494459\n\
    const MaxInt8 = 127\n\
    func Sin(x float64) float64\n\
    func Frexp(f float64) (frac float64, exp int)\n";

const IO: &str = "package io\n\
    import errors \"errors\"\n\
    var EOF error\n\
    type Reader interface { Read(p []byte) (n int, err error) }\n\
    type Writer interface { Write(p []byte) (n int, err error) }\n\
    type ReadWriter interface { ? Reader; ? Writer }\n\
    func ReadAll(r Reader) ([]byte, error)\n";

const ERRORS: &str = "package errors\nfunc New(text string) error\n";

#[test]
fn test_import_from_archive() {
    let dir = TempDir::new().unwrap();
    let math = archive(&[
        ("__.PKGDEF", &pkgdef(MATH)),
        ("_go_.o", b"go object linux amd64 go1.6\n\n!\ncode"),
    ]);
    write(dir.path(), "math.a", &math);

    let mut registry = Registry::new();
    let pkg = registry.import("math", dir.path()).unwrap();
    assert!(pkg.is_complete());
    assert_eq!(pkg.name(), "math");
    assert_eq!(pkg.scope().names(), vec!["Frexp", "MaxInt8", "Pi", "Sin"]);

    let types = registry.types();
    let scope = pkg.scope();
    let pi = scope.lookup("Pi").unwrap();
    assert_eq!(pi.kind(), ObjectKind::Const);
    assert_eq!(object_string(pi, types, Some("math")), "const Pi untyped float");
    assert!(pi.value().unwrap().to_string().starts_with("3.14159265358979323846"));
    assert_eq!(
        object_string(scope.lookup("Sin").unwrap(), types, Some("math")),
        "func Sin(x float64) float64"
    );
    assert_eq!(
        object_string(scope.lookup("Frexp").unwrap(), types, None),
        "func math.Frexp(f float64) (frac float64, exp int)"
    );
    assert_eq!(
        object_string(scope.lookup("MaxInt8").unwrap(), types, Some("math")),
        "const MaxInt8 untyped int"
    );

    let rendered: Vec<String> = scope
        .iter()
        .map(|obj| object_string(obj, types, Some("math")))
        .collect();
    assert_eq!(
        rendered,
        vec![
            "func Frexp(f float64) (frac float64, exp int)",
            "const MaxInt8 untyped int",
            "const Pi untyped float",
            "func Sin(x float64) float64",
        ]
    );
}

#[test]
fn test_dependencies_are_shared() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "io.a", &archive(&[("__.PKGDEF", &pkgdef(IO))]));
    write(dir.path(), "errors.o", &pkgdef(ERRORS));

    let mut registry = Registry::new();
    let io = registry.import("io", dir.path()).unwrap();
    let errors = registry.import("errors", dir.path()).unwrap();

    assert_eq!(io.imports().len(), 1);
    assert!(Arc::ptr_eq(&io.imports()[0], &errors));
    assert_eq!(errors.name(), "errors");
    assert_eq!(registry.stats().decodes, 2);

    let rw = io.scope().lookup("ReadWriter").unwrap();
    assert_eq!(
        object_string(rw, registry.types(), Some("io")),
        concat!(
            "type ReadWriter interface{Read(p []byte) (n int, err error); ",
            "Write(p []byte) (n int, err error)}"
        )
    );
    assert!(registry.types().lookup_method(rw.ty(), "Write").is_some());
    assert_eq!(
        object_string(io.scope().lookup("ReadAll").unwrap(), registry.types(), Some("io")),
        "func ReadAll(r Reader) ([]byte, error)"
    );
}

#[test]
fn test_local_import_paths_are_cleaned() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "testdata/p.o", &pkgdef("package p\nvar X int\n"));

    let mut registry = Registry::new();
    let first = registry.import("./testdata/p", dir.path()).unwrap();
    for path in ["./././testdata/p", "./testdata/../testdata/p", "./testdata//p"] {
        let again = registry.import(path, dir.path()).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }
    assert!(first.is_complete());
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.stats().decodes, 1);
}

#[test]
fn test_missing_dependency_reports_chain() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "app.a",
        &archive(&[("__.PKGDEF", &pkgdef("package app\nimport lib \"lib\"\n"))]),
    );

    let mut registry = Registry::new();
    let err = registry.import("app", dir.path()).unwrap_err();
    assert_eq!(err.chain(), vec!["app", "lib"]);
    match err.root_cause() {
        ImportError::NotFound { path, tried } => {
            assert_eq!(path, "lib");
            assert_eq!(
                tried,
                &vec![dir.path().join("lib.a"), dir.path().join("lib.o")]
            );
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert!(registry.get("app").is_none());

    // the dependency shows up later; the import can be retried
    write(dir.path(), "lib.o", &pkgdef("package lib\n"));
    let app = registry.import("app", dir.path()).unwrap();
    assert_eq!(app.imports()[0].name(), "lib");
}

#[test]
fn test_framing_errors() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "plain.o", b"go object linux amd64\nno export data here\n");
    write(dir.path(), "nodef.a", &archive(&[("_go_.o", b"code")]));

    let mut registry = Registry::new();
    assert!(matches!(
        registry.import("plain", dir.path()),
        Err(ImportError::Format {
            source: FormatError::MissingStartDelimiter,
            ..
        })
    ));
    assert!(matches!(
        registry.import("nodef", dir.path()),
        Err(ImportError::Format {
            source: FormatError::MissingPkgDef,
            ..
        })
    ));
}

#[test]
fn test_configured_extensions() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "math.a", &archive(&[("__.PKGDEF", &pkgdef(MATH))]));
    write(dir.path(), "math.x", b"broken");

    let mut registry = Registry::with_config(ImportConfig::default().with_extensions([".x", ".a"]));
    assert!(registry.import("math", dir.path()).is_err());

    let mut registry = Registry::with_config(ImportConfig::default().with_extensions([".a"]));
    assert!(registry.import("math", dir.path()).is_ok());
}

#[test]
fn test_sync_registry_from_threads() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "io.a", &archive(&[("__.PKGDEF", &pkgdef(IO))]));
    write(dir.path(), "errors.o", &pkgdef(ERRORS));
    write(dir.path(), "math.a", &archive(&[("__.PKGDEF", &pkgdef(MATH))]));

    let registry = &SyncRegistry::new();
    let src = dir.path();
    std::thread::scope(|s| {
        for path in ["io", "errors", "math", "io", "math", "errors"] {
            s.spawn(move || {
                let pkg = registry.import(path, src).unwrap();
                assert!(pkg.is_complete());
            });
        }
    });

    assert_eq!(registry.stats().decodes, 3);
    assert_eq!(registry.packages().len(), 4);
    let io = registry.get("io").unwrap();
    let errors = registry.get("errors").unwrap();
    assert!(Arc::ptr_eq(&io.imports()[0], &errors));
}
