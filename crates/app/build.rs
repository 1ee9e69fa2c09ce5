// Compiles the GLSL shaders in shaders/ to SPIR-V with glslc.
//
// Output goes to $OUT_DIR/shaders and the directory is exported to the
// crate as JVSC_SHADER_DIR. A missing glslc is a warning, not a failure;
// the app then reports the missing .spv files at startup.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=shaders");
    println!("cargo:rerun-if-env-changed=GLSLC");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap_or_else(|_| "target".to_string()));
    let shader_out = out_dir.join("shaders");
    println!("cargo:rustc-env=JVSC_SHADER_DIR={}", shader_out.display());

    if let Err(e) = fs::create_dir_all(&shader_out) {
        println!("cargo:warning=Failed to create {}: {}", shader_out.display(), e);
        return;
    }

    let sources = match fs::read_dir("shaders") {
        Ok(entries) => entries,
        Err(e) => {
            println!("cargo:warning=No shader directory: {}", e);
            return;
        }
    };

    let glslc = env::var("GLSLC").unwrap_or_else(|_| "glslc".to_string());

    for entry in sources.flatten() {
        let path = entry.path();
        let is_shader = path
            .extension()
            .is_some_and(|ext| ext == "vert" || ext == "frag");
        if !is_shader {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };

        let output = shader_out.join(format!("{}.spv", file_name.to_string_lossy()));
        compile(&glslc, &path, &output);
    }
}

fn compile(glslc: &str, input: &Path, output: &Path) {
    let result = Command::new(glslc)
        .arg(input)
        .arg("-o")
        .arg(output)
        .status();

    match result {
        Ok(status) if status.success() => {}
        Ok(status) => {
            panic!(
                "glslc failed on {}: exit code {:?}",
                input.display(),
                status.code()
            );
        }
        Err(e) => {
            println!(
                "cargo:warning=glslc not available ({e}); {} was not compiled",
                input.display()
            );
        }
    }
}
