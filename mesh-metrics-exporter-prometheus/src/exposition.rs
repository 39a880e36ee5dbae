use std::{cmp::Ordering, iter, sync::Arc};

use mesh_metrics::{Metric, Registry};

use crate::formatting::{
    metric_stem, render_labels, sanitize_metric_name, write_metric_line, SampleValue,
};

const HISTOGRAM_SUFFIXES: [&str; 4] = ["min", "max", "avg", "count"];

struct RegistryEntry<'a> {
    stem: String,
    labels: String,
    registry: &'a Arc<Registry>,
}

struct Sample {
    name: String,
    suffix: Option<&'static str>,
    entry: usize,
    derived: bool,
    value: SampleValue,
}

impl Sample {
    fn full_name(&self) -> impl Iterator<Item = u8> + '_ {
        let suffix = self.suffix.into_iter().flat_map(|s| iter::once(b'_').chain(s.bytes()));
        self.name.bytes().chain(suffix)
    }

    fn cmp_order(&self, other: &Sample) -> Ordering {
        self.full_name()
            .cmp(other.full_name())
            .then(self.entry.cmp(&other.entry))
            .then(self.derived.cmp(&other.derived))
    }
}

/// Renders the given registries in the Prometheus exposition format.
///
/// See [`write_exposition`] for details on how the output is laid out.
pub fn render(registries: &[Arc<Registry>]) -> String {
    let mut output = String::with_capacity(registries.len() * 64);
    write_exposition(&mut output, registries);
    output
}

/// Writes the given registries in the Prometheus exposition format into `buffer`.
///
/// Samples are ordered by their full name, and then by the stem and label set of the registry they
/// come from.  All samples sharing a name are contiguous, even when registries with different stems
/// derive the same name, and the output for a given state is always the same.
///
/// Registries without any metrics contribute nothing, and the same registry passed more than once
/// is only written once.
pub fn write_exposition(buffer: &mut String, registries: &[Arc<Registry>]) {
    let mut entries = registries
        .iter()
        .map(|registry| RegistryEntry {
            stem: metric_stem(registry.identity()),
            labels: render_labels(registry.labels()),
            registry,
        })
        .collect::<Vec<_>>();
    entries.sort_by(|a, b| a.stem.cmp(&b.stem).then_with(|| a.labels.cmp(&b.labels)));
    entries.dedup_by(|a, b| Arc::ptr_eq(a.registry, b.registry));

    let mut samples = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        entry.registry.for_each(|key, metric| {
            let name = sanitize_metric_name(&format!("{}_{}", entry.stem, key));
            collect_samples(&mut samples, name, idx, metric);
        });
    }

    samples.sort_by(Sample::cmp_order);
    for sample in &samples {
        write_metric_line(
            buffer,
            &sample.name,
            sample.suffix,
            &entries[sample.entry].labels,
            sample.value,
        );
    }
}

fn collect_samples(samples: &mut Vec<Sample>, name: String, entry: usize, metric: &Metric) {
    match metric {
        Metric::Counter(counter) => samples.push(Sample {
            name,
            suffix: None,
            entry,
            derived: false,
            value: SampleValue::Integer(counter.value()),
        }),
        Metric::Gauge(gauge) => samples.push(Sample {
            name,
            suffix: None,
            entry,
            derived: false,
            value: SampleValue::Integer(gauge.value()),
        }),
        Metric::Histogram(histogram) => {
            let snapshot = histogram.snapshot();
            let values = [
                SampleValue::Integer(snapshot.min),
                SampleValue::Integer(snapshot.max),
                SampleValue::Float(snapshot.mean()),
                SampleValue::Unsigned(snapshot.count),
            ];

            for (suffix, value) in HISTOGRAM_SUFFIXES.into_iter().zip(values) {
                samples.push(Sample {
                    name: name.clone(),
                    suffix: Some(suffix),
                    entry,
                    derived: true,
                    value,
                });
            }
        }
    }
}
