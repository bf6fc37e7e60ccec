use anyhow::{anyhow, Context, Result};
use jackc::codegen::{Codegen, CodegenContext};
use jackc::jack_sources;
use jackc::lexer::JackTokenizer;
use jackc::parser::{Class, Parse};
use jackc::vmwriter::VmWriter;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

fn main() -> Result<()> {
    let args = std::env::args().collect::<Vec<_>>();
    if args.len() != 2 {
        println!(
            "USAGE: {} <src.jack | srcdir>",
            args.first().map(String::as_str).unwrap_or("jackc")
        );

        return Err(anyhow!("invalid argument"));
    }

    let sources = jack_sources(Path::new(&args[1]))
        .with_context(|| format!("failed to read {}", &args[1]))?;
    if sources.is_empty() {
        return Err(anyhow!("directory {} contains no .jack file", &args[1]));
    }

    for source in sources {
        let file = File::open(&source)
            .with_context(|| format!("failed to open {}", source.display()))?;
        let mut tokenizer = JackTokenizer::new(BufReader::new(file));
        let class = Class::parse(&mut tokenizer)
            .with_context(|| format!("{}: line {}", source.display(), tokenizer.line()))?;

        let dst_path = source.with_extension("vm");
        let dst = File::create(&dst_path)
            .with_context(|| format!("failed to create {}", dst_path.display()))?;
        let mut writer = VmWriter::new(BufWriter::new(dst));
        let mut ctx = CodegenContext::new();

        let result = class
            .generate(&mut writer, &mut ctx)
            .with_context(|| format!("failed to compile {}", source.display()))
            .and_then(|_| {
                writer
                    .finish()
                    .map(|_| ())
                    .with_context(|| format!("failed to write {}", dst_path.display()))
            });

        if result.is_err() {
            // do not leave a truncated .vm behind
            let _ = std::fs::remove_file(&dst_path);
            return result;
        }
    }

    Ok(())
}
