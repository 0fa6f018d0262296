use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, Criterion};
use nutrition_coach::models::{
    ActivityLevel, DailyNutritionLog, Gender, MealLog, MealSlot, UserMetrics,
};
use nutrition_coach::services::calculate_daily_goals;
use nutrition_coach::services::daily_log::{with_meal, without_meal};
use std::hint::black_box;
use uuid::Uuid;

fn meal(i: usize) -> MealLog {
    MealLog {
        id: Uuid::new_v4(),
        food_name: format!("Meal {}", i),
        calories: 250.0 + i as f64,
        protein: 20.0,
        carbs: 30.0,
        fat: 8.5,
        meal_slot: MealSlot::Snack,
        eaten_at: "2026-03-02T12:00:00.000Z".to_string(),
        image_url: None,
        thumbnail_url: None,
        source: None,
    }
}

fn benchmark_goal_calculation(c: &mut Criterion) {
    let metrics = UserMetrics {
        user_id: "bench".to_string(),
        current_weight: 80.0,
        goal_weight: 75.0,
        height: 178.0,
        age: 30,
        gender: Gender::Male,
        activity_level: ActivityLevel::Moderate,
        updated_at: String::new(),
    };

    c.bench_function("calculate_daily_goals", |b| {
        b.iter(|| calculate_daily_goals(black_box(&metrics)))
    });
}

fn benchmark_log_folds(c: &mut Criterion) {
    let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

    // A busy day: totals are refolded from every meal on each change
    let mut busy = DailyNutritionLog::zeroed("bench", date, String::new());
    for i in 0..50 {
        busy = with_meal(&busy, meal(i));
    }
    let extra = meal(50);
    let first_id = busy.meals_data[0].id;

    let mut group = c.benchmark_group("daily_log");

    group.bench_function("add_meal_to_busy_day", |b| {
        b.iter(|| with_meal(black_box(&busy), extra.clone()))
    });

    group.bench_function("remove_meal_from_busy_day", |b| {
        b.iter(|| without_meal(black_box(&busy), first_id))
    });

    group.finish();
}

criterion_group!(benches, benchmark_goal_calculation, benchmark_log_folds);
criterion_main!(benches);
