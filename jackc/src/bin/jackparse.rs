use anyhow::{anyhow, Context, Result};
use jackc::jack_sources;
use jackc::lexer::JackTokenizer;
use jackc::parser::{Class, Parse};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

fn main() -> Result<()> {
    let args = std::env::args().collect::<Vec<_>>();
    if args.len() != 2 {
        println!(
            "USAGE: {} <src.jack | srcdir>",
            args.first().map(String::as_str).unwrap_or("jackparse")
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

        let dst_path = source.with_extension("xml");
        let mut out = BufWriter::new(File::create(&dst_path).with_context(|| {
            format!("failed to create {}", dst_path.display())
        })?);

        writeln!(out, "{}", class)?;
        out.flush()
            .with_context(|| format!("failed to write {}", dst_path.display()))?;
    }

    Ok(())
}
