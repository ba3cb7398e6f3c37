use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};

use crate::{
    catalog::{BranchTag, Dimension, Level},
    slice::SliceChoice,
};

/// One line of the interactive command language.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Show,
    Set { dimension: Dimension, level: Level },
    Up(Dimension),
    Down(Dimension),
    Branch(BranchTag),
    /// Drill into the given 1-based row of the current page.
    Drill { row: usize, dimension: Dimension },
    Back,
    Reset,
    Filter { column: String, value: String },
    Unfilter(String),
    Slice(Dimension),
    Pick { dimension: Dimension, choice: SliceChoice },
    /// An empty text clears the search.
    Search(String),
    Sort(String),
    Page(usize),
    Kpi,
    Insights,
    Help,
    Quit,
}

pub const HELP: &str = "\
show                         print the current page
set <dim> <level>            set the level of a dimension
up <dim> | down <dim>        roll up or drill down one level
branch <category|supplier>   pick the product branch to descend into
drill <row> <dim>            drill into a row of the current page
back                         undo the last drill
reset                        clear filters and drills
filter <column> <value>      constrain a column
unfilter <column>            drop a column constraint
slice <dim>                  list filter values for a dimension
pick <dim> <value|*>         apply a filter value, or * for all
search [text]                search the table
sort <column>                sort the table, again to reverse
page <n>                     go to a page
kpi                          print the KPI summary
insights                     print best and worst performers
quit";

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (s, ""),
    }
}

fn required<'a>(arg: &'a str, what: &str) -> Result<&'a str> {
    if arg.is_empty() {
        bail!("missing {what}");
    }
    Ok(arg)
}

fn dimension(arg: &str) -> Result<Dimension> {
    Ok(required(arg, "dimension")?.parse()?)
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let (verb, rest) = split_word(line);
        let command = match verb.to_ascii_lowercase().as_str() {
            "show" | "" => Command::Show,
            "set" => {
                let (dim, level) = split_word(rest);
                Command::Set {
                    dimension: dimension(dim)?,
                    level: required(level, "level")?.parse()?,
                }
            }
            "up" => Command::Up(dimension(rest)?),
            "down" => Command::Down(dimension(rest)?),
            "branch" => Command::Branch(required(rest, "branch")?.parse()?),
            "drill" => {
                let (row, dim) = split_word(rest);
                let row = required(row, "row")?
                    .parse::<usize>()
                    .with_context(|| format!("invalid row '{row}'"))?;
                Command::Drill {
                    row,
                    dimension: dimension(dim)?,
                }
            }
            "back" => Command::Back,
            "reset" => Command::Reset,
            "filter" => {
                let (column, value) = split_word(rest);
                Command::Filter {
                    column: required(column, "column")?.to_string(),
                    value: required(value, "value")?.to_string(),
                }
            }
            "unfilter" => Command::Unfilter(required(rest, "column")?.to_string()),
            "slice" => Command::Slice(dimension(rest)?),
            "pick" => {
                let (dim, value) = split_word(rest);
                let choice = match required(value, "value")? {
                    "*" => SliceChoice::All,
                    value => SliceChoice::Value(value.to_string()),
                };
                Command::Pick {
                    dimension: dimension(dim)?,
                    choice,
                }
            }
            "search" => Command::Search(rest.to_string()),
            "sort" => Command::Sort(required(rest, "column")?.to_string()),
            "page" => Command::Page(
                required(rest, "page")?
                    .parse::<usize>()
                    .with_context(|| format!("invalid page '{rest}'"))?,
            ),
            "kpi" => Command::Kpi,
            "insights" => Command::Insights,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(anyhow!("unknown command '{other}', try 'help'")),
        };
        Ok(command)
    }
}
