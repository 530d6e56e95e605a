use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, NaiveDate, Utc};
use fuelcert_certification::{CalendarNames, CalendarRange, CertificationRecord, project};
use fuelcert_core::{CertificationId, FuelerId, TrainingId};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

/// A crew of `fuelers` people, each holding every one of `trainings` certifications,
/// completions spread over the past two years.
fn roster(fuelers: usize, trainings: usize) -> (Vec<CertificationRecord>, CalendarNames) {
    let mut names = CalendarNames::default();
    let training_ids: Vec<TrainingId> = (0..trainings)
        .map(|i| {
            let id = TrainingId::new();
            names.trainings.insert(id, format!("Training {i}"));
            id
        })
        .collect();

    let mut records = Vec::with_capacity(fuelers * trainings);
    for f in 0..fuelers {
        let fueler_id = FuelerId::new();
        names.fuelers.insert(fueler_id, format!("Fueler {f}"));
        for (t, training_id) in training_ids.iter().enumerate() {
            let completed = today() - Duration::days(((f * 31 + t * 17) % 730) as i64);
            records.push(CertificationRecord {
                id: CertificationId::new(),
                fueler_id,
                training_id: *training_id,
                completed_date: completed,
                expiry_date: (t % 4 != 0).then(|| completed + Duration::days(365)),
                notes: None,
                certified_by: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            });
        }
    }
    (records, names)
}

fn bench_calendar_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("calendar_projection");

    for crew in [10usize, 100, 1_000] {
        let (records, names) = roster(crew, 8);
        let range = CalendarRange::with_defaults(None, None, today()).unwrap();

        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(crew), &records, |b, records| {
            b.iter(|| black_box(project(records.iter(), range, &names, today())));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_calendar_projection);
criterion_main!(benches);
