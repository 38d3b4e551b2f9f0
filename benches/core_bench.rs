//! Benchmarks for snackstack core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use snackstack::constructs::network;
use snackstack::core::env::EnvSettings;
use snackstack::core::template::{logical_id, ref_to, CfnResource, Template};
use snackstack::core::types::{ImageSource, InfraConfig, NetworkConfig};
use snackstack::core::{parser, resolver, synth};
use snackstack::provenance::hasher;
use std::collections::HashMap;
use std::path::Path;

fn bench_blake3_string(c: &mut Criterion) {
    let mut group = c.benchmark_group("blake3_string");
    for size in [64, 256, 1024, 4096] {
        let input: String = "x".repeat(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| black_box(hasher::hash_string(black_box(input))));
        });
    }
    group.finish();
}

fn bench_asset_fingerprint(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..32 {
        let sub = dir.path().join(format!("app/models/m{}", i % 4));
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join(format!("f{i}.rb")), vec![b'#'; 4096]).unwrap();
    }
    std::fs::create_dir_all(dir.path().join("tmp")).unwrap();
    std::fs::write(dir.path().join("tmp/cache.bin"), vec![0u8; 1 << 20]).unwrap();
    let excludes = hasher::compile_excludes(&["tmp/**".to_string()]).unwrap();

    c.bench_function("asset_fingerprint_32_files", |b| {
        b.iter(|| black_box(hasher::hash_directory(black_box(dir.path()), &excludes).unwrap()));
    });
}

fn bench_yaml_parse(c: &mut Criterion) {
    let yaml = r#"
version: "1.0"
name: StartupSnack-WebService
database:
  kind: instance
  instance_class: t3
  instance_size: small
  allocated_storage: 10
  max_allocated_storage: 20
service:
  cpu: 512
  memory_mib: 1024
  container_port: 3000
  image:
    source: registry
    image: public.ecr.aws/docker/library/ruby:2.7
  deployment:
    desired_count: 1
    min_healthy_percent: 100
    max_healthy_percent: 200
site:
  stack_name: StartupSnack-WebService-SinglePageApp
"#;

    c.bench_function("yaml_parse_validate_config", |b| {
        b.iter(|| {
            let config = parser::parse_config(black_box(yaml)).unwrap();
            black_box(parser::validate_config(&config));
        });
    });
}

fn bench_logical_id(c: &mut Criterion) {
    c.bench_function("logical_id", |b| {
        b.iter(|| {
            black_box(logical_id(black_box(&[
                "Service",
                "LB",
                "PublicListener",
                "ECSGroup",
            ])))
        });
    });
}

fn bench_creation_order(c: &mut Criterion) {
    // Linear chain of N resources, each referencing the previous one
    let mut group = c.benchmark_group("creation_order");
    for n in [10, 50, 100] {
        let mut template = Template::new(None);
        for i in 0..n {
            let props = if i == 0 {
                json!({})
            } else {
                json!({ "Prev": ref_to(&format!("Node{:04}", i - 1)) })
            };
            template
                .add(format!("Node{i:04}"), CfnResource::new("AWS::SNS::Topic", props))
                .unwrap();
        }
        group.bench_with_input(BenchmarkId::from_parameter(n), &template, |b, t| {
            b.iter(|| black_box(resolver::build_creation_order(black_box(t)).unwrap()));
        });
    }
    group.finish();
}

fn bench_synth(c: &mut Criterion) {
    let mut vars = HashMap::new();
    vars.insert("CDK_DEFAULT_ACCOUNT".to_string(), "123456789012".to_string());
    vars.insert("O_AUTH_TOKEN".to_string(), "token".to_string());
    let env = EnvSettings::from_map(&vars);

    let mut context = network::LookupContext::new();
    context.insert(
        network::vpc_lookup_key("123456789012", &env.region, &NetworkConfig::default()),
        serde_json::to_value(network::example_vpc(&["us-east-2a", "us-east-2b"])).unwrap(),
    );

    let mut config = InfraConfig::default();
    config.service.image = ImageSource::Registry {
        image: "public.ecr.aws/docker/library/ruby:2.7".to_string(),
    };

    c.bench_function("synth_app", |b| {
        b.iter(|| {
            let input = synth::SynthInput {
                config: &config,
                env: &env,
                context: &context,
                base_dir: Path::new("."),
            };
            black_box(synth::synth_app(input, None).unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_blake3_string,
    bench_asset_fingerprint,
    bench_yaml_parse,
    bench_logical_id,
    bench_creation_order,
    bench_synth
);
criterion_main!(benches);
