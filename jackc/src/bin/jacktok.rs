use anyhow::{anyhow, Context, Result};
use jackc::jack_sources;
use jackc::lexer::{JackTokenizer, Token};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

fn main() -> Result<()> {
    let args = std::env::args().collect::<Vec<_>>();
    if args.len() != 2 {
        println!(
            "USAGE: {} <src.jack | srcdir>",
            args.first().map(String::as_str).unwrap_or("jacktok")
        );

        return Err(anyhow!("invalid argument"));
    }

    let sources = jack_sources(Path::new(&args[1]))
        .with_context(|| format!("failed to read {}", &args[1]))?;
    if sources.is_empty() {
        return Err(anyhow!("directory {} contains no .jack file", &args[1]));
    }

    for source in sources {
        let stem = source
            .file_stem()
            .ok_or_else(|| anyhow!("invalid file name {}", source.display()))?
            .to_string_lossy()
            .into_owned();
        let dst_path = source.with_file_name(format!("{}T.xml", stem));

        let result = dump_tokens(&source, &dst_path);
        if result.is_err() {
            // do not leave an unclosed token listing behind
            let _ = std::fs::remove_file(&dst_path);
            return result;
        }
    }

    Ok(())
}

fn dump_tokens(source: &Path, dst_path: &Path) -> Result<()> {
    let file =
        File::open(source).with_context(|| format!("failed to open {}", source.display()))?;
    let mut tokenizer = JackTokenizer::new(BufReader::new(file));
    let mut out = BufWriter::new(File::create(dst_path).with_context(|| {
        format!("failed to create {}", dst_path.display())
    })?);

    writeln!(out, "<tokens>")?;
    loop {
        let token = tokenizer
            .advance()
            .with_context(|| format!("{}: line {}", source.display(), tokenizer.line()))?;

        if token == Token::EndOfFile {
            break;
        }

        writeln!(out, "{}", token.to_xml_element())?;
    }
    writeln!(out, "</tokens>")?;
    out.flush()
        .with_context(|| format!("failed to write {}", dst_path.display()))?;

    Ok(())
}
