use anyhow::{anyhow, Context, Result};
use hackasm::assemble;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

fn main() -> Result<()> {
    let args = std::env::args().collect::<Vec<_>>();
    if args.len() != 2 {
        println!(
            "USAGE: {} <src.asm>",
            args.first().map(String::as_str).unwrap_or("hackasm")
        );

        return Err(anyhow!("invalid argument"));
    }

    let src_path = Path::new(&args[1]);
    let dst_path = src_path.with_extension("hack");

    let result = translate(src_path, &dst_path);
    if result.is_err() {
        // do not leave a truncated .hack behind
        let _ = std::fs::remove_file(&dst_path);
    }

    result
}

fn translate(src_path: &Path, dst_path: &Path) -> Result<()> {
    let src = File::open(src_path)
        .with_context(|| format!("failed to open {}", src_path.display()))?;
    let dst = File::create(dst_path)
        .with_context(|| format!("failed to create {}", dst_path.display()))?;
    let mut dst = BufWriter::new(dst);

    assemble(BufReader::new(src), &mut dst)
        .with_context(|| format!("failed to assemble {}", src_path.display()))?;
    dst.flush()
        .with_context(|| format!("failed to write {}", dst_path.display()))?;

    Ok(())
}
