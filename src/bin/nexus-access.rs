use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use bson::Bson;
use clap::{Parser, Subcommand};
use nexus_access::criteria::{parse_criteria_json, parse_sort};
use nexus_access::{
    AccessError, DocumentQuery, DocumentTemplate, MemoryBackend, MemoryBackendOptions, PageState, Record,
    TemplateConfig, compile_count, compile_find,
};

#[derive(Parser, Debug)]
#[command(name = "nexus-access", version, about = "Compile and run document criteria queries", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML). If omitted, NEXUS_ACCESS_CONFIG or ./nexus-access.toml is used.")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Print the parameterized query a JSON filter compiles to")]
    Compile {
        #[arg(long, default_value = "true", help = "Criteria as JSON, e.g. {\"field\":\"age\",\"$gt\":21}")]
        filter: String,
        #[arg(long, help = "Emit the count shape instead of the find shape")]
        count: bool,
        #[arg(long, help = "Sort as field[:asc|:desc], comma separated")]
        sort: Option<String>,
        #[arg(long, help = "Partition key field used for cross-partition inference")]
        partition_key: Option<String>,
    },
    #[command(about = "Load an NDJSON file into an in-memory store and run a query against it")]
    Query {
        #[arg(help = "NDJSON file, one record with a string \"id\" per line")]
        file: PathBuf,
        #[arg(long, default_value = "records", help = "Collection name to load into")]
        collection: String,
        #[arg(long, help = "Partition key field of the collection")]
        partition_key: Option<String>,
        #[arg(long, default_value = "true", help = "Criteria as JSON")]
        filter: String,
        #[arg(long, help = "Sort as field[:asc|:desc], comma separated")]
        sort: Option<String>,
        #[arg(long, help = "Print the match count instead of records")]
        count: bool,
        #[arg(long, help = "Return a single page of this size")]
        page_size: Option<usize>,
        #[arg(long, help = "Continuation token from a previous page")]
        continuation: Option<String>,
        #[arg(long, help = "Cap items per backend response to emulate throttling")]
        max_per_response: Option<usize>,
    },
}

fn build_query(filter: &str, sort: Option<&str>) -> Result<DocumentQuery, AccessError> {
    let mut query = DocumentQuery::new(parse_criteria_json(filter)?);
    if let Some(s) = sort {
        query = query.with_sort(parse_sort(s)?);
    }
    Ok(query)
}

fn to_json(record: Record) -> serde_json::Value {
    Bson::Document(record).into_relaxed_extjson()
}

fn load_ndjson(path: &Path) -> Result<Vec<Record>, AccessError> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut out = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(&line)?;
        let record = bson::to_document(&value)
            .map_err(|e| AccessError::Mapping(format!("line {}: {e}", n + 1)))?;
        out.push(record);
    }
    Ok(out)
}

fn run(cli: Cli) -> Result<(), AccessError> {
    let config = TemplateConfig::load(cli.config.as_deref())?;
    if config.log_dir.is_some() {
        config.init_logging()?;
    }
    match cli.command {
        Commands::Compile { filter, count, sort, partition_key } => {
            let query = build_query(&filter, sort.as_deref())?;
            let spec = if count { compile_count(&query)? } else { compile_find(&query)? };
            let fields: Vec<String> = partition_key.into_iter().collect();
            let out = serde_json::json!({
                "text": spec.text(),
                "parameters": spec.parameters(),
                "cross_partition": query.is_cross_partition(&fields),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Query {
            file,
            collection,
            partition_key,
            filter,
            sort,
            count,
            page_size,
            continuation,
            max_per_response,
        } => {
            let backend = MemoryBackend::with_options(MemoryBackendOptions {
                max_items_per_response: max_per_response,
                auto_create_collections: false,
            })
            .with_collection(&collection, partition_key.as_deref());
            let loaded = backend
                .seed(&collection, load_ndjson(&file)?)
                .map_err(|e| nexus_access::template::translate(nexus_access::template::Operation::Insert, e))?;
            log::info!("loaded {loaded} record(s) from {} into '{collection}'", file.display());

            let template = DocumentTemplate::builder(Arc::new(backend)).config(config).build()?;
            let mut query = build_query(&filter, sort.as_deref())?;
            if count {
                println!("{}", template.count::<Record>(&query, &collection)?);
            } else if let Some(size) = page_size {
                let state = match continuation {
                    Some(token) => PageState::new(0, size, 0, Some(token)),
                    None => PageState::first(size),
                };
                query = query.with_page(state);
                let page = template.paginate::<Record>(&query, &collection)?;
                let (size, total, pages) = (page.size(), page.total_elements(), page.total_pages());
                let next = page.continuation().map(str::to_string);
                let content: Vec<_> = page.into_content().into_iter().map(to_json).collect();
                let out = serde_json::json!({
                    "size": size,
                    "total_elements": total,
                    "total_pages": pages,
                    "continuation": next,
                    "content": content,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                for record in template.find::<Record>(&query, &collection)? {
                    println!("{}", to_json(record));
                }
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
