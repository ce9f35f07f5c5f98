use std::sync::Arc;

use dxrag_cli::{init_tracing, load_settings, take_flag, take_switch};
use dxrag_hybrid::{DiagnosisPipeline, RetrievalContext};

fn main() -> anyhow::Result<()> {
    init_tracing();
    let (settings, base) = load_settings()?;
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let top_n = take_flag(&mut args, "-n")?.map(|v| v.parse::<usize>()).transpose()?.unwrap_or(settings.top_n_diag);
    let as_json = take_switch(&mut args, "--json");
    if args.is_empty() {
        eprintln!("Usage: dxrag-diagnose [-n N] [--json] <symptoms...>");
        std::process::exit(1);
    }
    let symptoms = args.join(" ");

    let ctx = Arc::new(RetrievalContext::from_settings(settings, &base)?);
    tokio::runtime::Runtime::new()?.block_on(ctx.load())?;
    let pipeline = DiagnosisPipeline::retrieval_only(ctx);
    let diagnoses = pipeline.diagnose(&symptoms, top_n)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&diagnoses)?);
        return Ok(());
    }
    if diagnoses.is_empty() {
        println!("No protocol evidence found for: \"{symptoms}\"");
    }
    for d in &diagnoses {
        println!("{}. {} [{}]\n   {}", d.rank, d.diagnosis, d.icd10_code, d.explanation);
    }
    Ok(())
}
