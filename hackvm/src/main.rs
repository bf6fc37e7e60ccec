use anyhow::{anyhow, Context, Result};
use hackvm::{CodeWriter, Parser};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let args = std::env::args().collect::<Vec<_>>();
    if args.len() != 2 {
        println!(
            "USAGE: {} <src.vm | srcdir>",
            args.first().map(String::as_str).unwrap_or("hackvm")
        );

        return Err(anyhow!("invalid argument"));
    }

    let src_path = Path::new(&args[1]);
    let (sources, dst_path, bootstrap) = if src_path.is_dir() {
        let sources = std::fs::read_dir(src_path)
            .with_context(|| format!("failed to open directory {}", &args[1]))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map(|e| e == "vm").unwrap_or(false))
            .collect::<Vec<_>>();

        if sources.is_empty() {
            return Err(anyhow!("directory {} contains no .vm file", &args[1]));
        }

        let name = src_path
            .file_name()
            .ok_or_else(|| anyhow!("invalid directory name {}", &args[1]))?
            .to_string_lossy()
            .into_owned();
        let dst_path = src_path.join(format!("{}.asm", name));

        (sources, dst_path, true)
    } else {
        (
            vec![PathBuf::from(&args[1])],
            src_path.with_extension("asm"),
            false,
        )
    };

    let result = translate(&sources, &dst_path, bootstrap);
    if result.is_err() {
        // do not leave a truncated .asm behind
        let _ = std::fs::remove_file(&dst_path);
    }

    result
}

fn translate(sources: &[PathBuf], dst_path: &Path, bootstrap: bool) -> Result<()> {
    let dst = File::create(dst_path)
        .with_context(|| format!("failed to create {}", dst_path.display()))?;
    let mut writer = CodeWriter::new(BufWriter::new(dst));

    if bootstrap {
        writer
            .write_bootstrap()
            .with_context(|| format!("failed to write {}", dst_path.display()))?;
    }

    for source in sources {
        let stem = source
            .file_stem()
            .ok_or_else(|| anyhow!("invalid file name {}", source.display()))?
            .to_string_lossy()
            .into_owned();
        writer.set_unit(&stem);

        let file =
            File::open(source).with_context(|| format!("failed to open {}", source.display()))?;
        let mut parser = Parser::new(BufReader::new(file))
            .with_context(|| format!("failed to parse {}", source.display()))?;

        while let Some(command) = parser
            .advance()
            .with_context(|| format!("failed to parse {}", source.display()))?
        {
            writer
                .write(&command)
                .with_context(|| format!("failed to write {}", dst_path.display()))?;
        }
    }

    writer
        .finish()
        .with_context(|| format!("failed to write {}", dst_path.display()))?;

    Ok(())
}
