use dxrag_cli::{init_tracing, load_settings, take_flag, take_switch};
use dxrag_hybrid::RetrievalContext;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let (settings, base) = load_settings()?;
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let k = take_flag(&mut args, "-k")?.map(|v| v.parse::<usize>()).transpose()?.unwrap_or(settings.top_k);
    let full = take_switch(&mut args, "--rerank");
    let as_json = take_switch(&mut args, "--json");
    if args.is_empty() {
        eprintln!("Usage: dxrag-search [-k N] [--rerank] [--json] <query words...>");
        std::process::exit(1);
    }
    let query = args.join(" ");

    let ctx = RetrievalContext::from_settings(settings, &base)?;
    tokio::runtime::Runtime::new()?.block_on(ctx.load())?;
    let hits = if full { ctx.retrieve_top(&query, k)? } else { ctx.search(&query, k)? };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    println!("Found {} passages for: \"{query}\"", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let s = &hit.scores;
        println!(
            "\n  {}. rrf={:.4}  dense={}  sparse={}  rerank={}  {} #{}",
            i + 1,
            s.rrf_score.unwrap_or(0.0),
            fmt_opt(s.dense_score),
            fmt_opt(s.sparse_score),
            fmt_opt(s.reranker_score),
            hit.passage.protocol_id,
            hit.passage.chunk_index,
        );
        let preview: String = hit.passage.text.chars().take(160).collect();
        println!("     {preview}");
    }
    Ok(())
}

fn fmt_opt(v: Option<f32>) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{x:.4}"))
}
