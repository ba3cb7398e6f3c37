use std::{
    io::{self, BufRead, Write},
    process::exit,
};

use anyhow::Result;
use clap::Parser;
use olap_explorer::{
    command::{Command, HELP},
    navigator::{Direction, Navigation},
    record::{Measure, MEASURES},
    service::{DataService, HttpDataService, MockDataService},
    session::{Explorer, FetchOutcome},
    settings::{Args, Settings},
    view::{
        dimension_label, extreme_records, insight_text, Extreme, Insight, Kpis, TableView,
        INSIGHT_COUNT,
    },
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    println!("OLAP Explorer");

    let args = Args::parse();
    let settings = match Settings::load(&args) {
        Ok(ret) => ret,
        Err(error) => {
            eprintln!("Problem while loading settings. {error}");
            exit(1);
        }
    };

    init_tracing(&settings.log.level);

    let service: Box<dyn DataService> = if settings.service.mock {
        info!("Using the in-memory data service");
        Box::new(MockDataService::new())
    } else {
        match HttpDataService::new(settings.service.url.as_str(), settings.timeout()) {
            Ok(ret) => {
                info!("Using the analysis service at {}", ret.url());
                Box::new(ret)
            }
            Err(error) => {
                eprintln!("Problem while creating the HTTP client. {error:#}");
                exit(1);
            }
        }
    };

    if let Err(error) = run(service.as_ref(), settings.view.rows_per_page).await {
        eprintln!("Problem while reading commands. {error:#}");
        exit(1);
    }
}

fn init_tracing(level: &str) {
    let level = level.parse::<Level>().unwrap_or_else(|_| {
        eprintln!("Unknown log level '{level}', using info");
        Level::INFO
    });
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Problem while setting up logging. {error}");
    }
}

async fn run(service: &dyn DataService, rows_per_page: usize) -> Result<()> {
    let mut explorer = Explorer::default();
    let mut table = TableView::new(rows_per_page);

    explorer.sync(service).await;
    print_page(&explorer, &table);
    print_status(&explorer);

    let stdin = io::stdin();
    prompt()?;
    for line in stdin.lock().lines() {
        let line = line?;
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(error) => {
                println!("{error:#}");
                prompt()?;
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        execute(&mut explorer, &mut table, command, rows_per_page);

        if let Some(outcome) = explorer.sync(service).await {
            if let FetchOutcome::Applied { records } = outcome {
                println!("{records} records loaded");
            }
            table.set_page(1);
            print_page(&explorer, &table);
        }
        print_status(&explorer);
        prompt()?;
    }
    Ok(())
}

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}

fn execute(explorer: &mut Explorer, table: &mut TableView, command: Command, rows_per_page: usize) {
    match command {
        Command::Show => print_page(explorer, table),
        Command::Set { dimension, level } => {
            explorer.set_level(dimension, level);
        }
        Command::Up(dimension) => report_step(explorer.navigate(dimension, Direction::Up)),
        Command::Down(dimension) => report_step(explorer.navigate(dimension, Direction::Down)),
        Command::Branch(branch) => {
            explorer.choose_branch(branch);
        }
        Command::Drill { row, dimension } => {
            let record = table
                .page(&explorer.data().records)
                .rows
                .get(row.wrapping_sub(1))
                .map(|rec| (*rec).clone());
            match record {
                Some(record) => {
                    explorer.drill_into(&record, dimension);
                }
                None => println!("no row {row} on this page"),
            }
        }
        Command::Back => {
            if explorer.drill_up().is_none() {
                println!("nothing to go back to");
            }
        }
        Command::Reset => {
            explorer.reset();
            *table = TableView::new(rows_per_page);
        }
        Command::Filter { column, value } => explorer.set_filter(column, value),
        Command::Unfilter(column) => {
            if !explorer.clear_filter(&column) {
                println!("no filter on '{column}'");
            }
        }
        Command::Slice(dimension) => {
            let slicer = explorer.slicer(dimension);
            let active = slicer.active(explorer.filters());
            println!(
                "{} at {} ({})",
                dimension,
                dimension_label(slicer.level.token()),
                slicer.columns.join(", ")
            );
            let marker = |selected: bool| if selected { "*" } else { " " };
            println!("{} (All)", marker(active.is_none()));
            for option in slicer.options(&explorer.data().records) {
                println!("{} {}", marker(active.as_deref() == Some(option.label.as_str())), option);
            }
        }
        Command::Pick { dimension, choice } => {
            explorer.pick_slice(dimension, &choice);
        }
        Command::Search(text) => {
            table.set_search(text);
            print_page(explorer, table);
        }
        Command::Sort(column) => {
            let direction = table.toggle_sort(&column);
            println!("sorted by {column} ({direction:?})");
            print_page(explorer, table);
        }
        Command::Page(number) => {
            table.set_page(number);
            print_page(explorer, table);
        }
        Command::Kpi => {
            let kpis = Kpis::from_records(&explorer.data().records);
            println!("Total Volume  {}", kpis.total_volume);
            println!("Total Orders  {}", kpis.total_orders);
            println!(
                "Avg Delay     {:.1}d{}",
                kpis.avg_delay,
                if kpis.delay_alert { "  (!)" } else { "" }
            );
        }
        Command::Insights => {
            let data = explorer.data();
            let columns = data.columns();
            println!("Top Performers");
            for rec in extreme_records(&data.records, Measure::TotalDelay, Extreme::Min, INSIGHT_COUNT) {
                println!("  {}", insight_text(rec, &columns, Insight::Good));
            }
            println!("Critical Items");
            for rec in extreme_records(&data.records, Measure::TotalDelay, Extreme::Max, INSIGHT_COUNT) {
                println!("  {}", insight_text(rec, &columns, Insight::Bad));
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

fn report_step(step: Navigation) {
    match step {
        Navigation::Moved(level) => println!("now at {level}"),
        Navigation::Unchanged(level) => println!("already at {level}"),
        Navigation::AmbiguousBranch(branches) => {
            let labels: Vec<_> = branches.iter().map(|b| b.label()).collect();
            println!("choose a branch with 'branch <category|supplier>': {}", labels.join(" / "));
        }
    }
}

fn print_page(explorer: &Explorer, table: &TableView) {
    let data = explorer.data();
    let columns = data.columns();
    let page = table.page(&data.records);

    let header: Vec<String> = columns
        .iter()
        .map(|col| dimension_label(col))
        .chain(MEASURES.iter().map(|m| m.label().to_string()))
        .collect();
    println!("    {}", header.join(" | "));
    for (idx, rec) in page.rows.iter().enumerate() {
        let cells: Vec<String> = columns
            .iter()
            .map(|col| rec.text(col))
            .chain(MEASURES.iter().map(|m| rec.text(m.key())))
            .collect();
        println!("{:>3} {}", idx + 1, cells.join(" | "));
    }
    println!(
        "Page {} of {} ({} records found)",
        page.number, page.total_pages, page.total_rows
    );
}

fn print_status(explorer: &Explorer) {
    let selection = explorer.selection();
    println!(
        "temp={} clie={} emp={} prod={}",
        selection.temp, selection.clie, selection.emp, selection.prod
    );
    if !explorer.filters().is_empty() {
        let filters: Vec<String> = explorer
            .filters()
            .iter()
            .map(|(col, value)| format!("{col}={value}"))
            .collect();
        println!("filters: {}", filters.join(", "));
    }
    if !explorer.drill_path().is_empty() {
        let path: Vec<&str> = explorer
            .drill_path()
            .iter()
            .map(|item| item.label.as_str())
            .collect();
        println!("drill path: {}", path.join(" > "));
    }
    if let Some(error) = explorer.error() {
        println!("error: {error}");
    }
}
