use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use crate::selection::{parse_selection, Selection};

/// Asks until the answer parses. End of input counts as "none".
pub(crate) fn prompt_selection<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    count: usize,
) -> Result<Selection> {
    loop {
        write!(
            writer,
            "Toggle which installation? [1-{count}, all, none]: "
        )
        .context("failed writing prompt")?;
        writer.flush().context("failed flushing prompt")?;

        let mut line = String::new();
        let read = reader.read_line(&mut line).context("failed reading answer")?;
        if read == 0 {
            writeln!(writer).context("failed writing prompt")?;
            return Ok(Selection::None);
        }

        match parse_selection(&line) {
            Ok(Selection::Indices(indices))
                if indices.iter().any(|index| *index > count) =>
            {
                writeln!(writer, "Please pick numbers between 1 and {count}.")
                    .context("failed writing prompt")?;
            }
            Ok(selection) => return Ok(selection),
            Err(err) => {
                writeln!(writer, "{err}").context("failed writing prompt")?;
            }
        }
    }
}
