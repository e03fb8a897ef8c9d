use criterion::{Criterion, black_box, criterion_group, criterion_main};
use regcraft::{
    Dialect, HeuristicProposer, OptimizerOptions, Pattern, SynthesisConfig, Synthesizer, TestCase, TesterConfig,
    convert_dialect, emit, library, optimize, test_regex,
};

fn wide_tree() -> Pattern {
    let words = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta"];
    let alternatives = words
        .iter()
        .flat_map(|w| [Pattern::literal(*w), Pattern::sequence(vec![Pattern::literal(&w[..1]), Pattern::literal(&w[1..])])])
        .chain(('a'..='h').map(|c| Pattern::range(c, c)))
        .collect();
    Pattern::sequence(vec![
        Pattern::literal("id"),
        Pattern::literal(":"),
        Pattern::alternation(alternatives).unwrap(),
        Pattern::repeat(Pattern::digit(), 1, Some(1), false).unwrap(),
    ])
}

fn bench_emit(c: &mut Criterion) {
    let tree = wide_tree();

    c.bench_function("emit_wide_tree", |b| {
        b.iter(|| black_box(emit(black_box(&tree), Dialect::Pcre, true)))
    });
}

fn bench_optimize(c: &mut Criterion) {
    let tree = wide_tree();
    let options = OptimizerOptions::default();

    c.bench_function("optimize_wide_tree", |b| {
        b.iter(|| black_box(optimize(black_box(&tree), &options)))
    });
}

fn bench_test_regex(c: &mut Criterion) {
    let entry = library::get("email").unwrap();
    let pattern = emit(&entry.pattern().unwrap(), Dialect::Js, true).pattern;
    let cases = vec![
        TestCase::positive("user@example.com"),
        TestCase::positive("first.last+tag@sub.example.org"),
        TestCase::negative("not an email"),
        TestCase::negative("missing@tld"),
    ];
    let config = TesterConfig::default();

    c.bench_function("test_regex_email", |b| {
        b.iter(|| black_box(test_regex(&pattern, black_box(&cases), Dialect::Js, &config)))
    });
}

fn bench_convert(c: &mut Criterion) {
    let pattern = r"^(?<year>\d{4})-(?<month>\d{2})(?=-)-(?<day>\d{2})\k<day>?$";

    c.bench_function("convert_js_to_re2", |b| {
        b.iter(|| black_box(convert_dialect(black_box(pattern), Dialect::Js, Dialect::Re2, true)))
    });
}

fn bench_synthesis(c: &mut Criterion) {
    let positives: Vec<String> = ["ab-12", "cd-345", "xyz-6"].iter().map(|s| s.to_string()).collect();
    let negatives: Vec<String> = ["ab12", "-12"].iter().map(|s| s.to_string()).collect();
    let synthesizer = Synthesizer::new(SynthesisConfig::default());
    let proposer = HeuristicProposer::default();

    c.bench_function("heuristic_synthesis", |b| {
        b.iter(|| black_box(synthesizer.run(&positives, &negatives, &proposer)))
    });
}

criterion_group!(
    benches,
    bench_emit,
    bench_optimize,
    bench_test_regex,
    bench_convert,
    bench_synthesis,
);

criterion_main!(benches);
