use epiabm::models;

pub fn main() {
    use simple_logger::SimpleLogger;
    SimpleLogger::new().init().unwrap();

    let mut model = models::sir("a virus", 0.01, 0.9, 0.3).expect("valid model parameters");
    model.seed(112);
    model
        .agents_smallworld(10000, 5, 0.01, false)
        .expect("valid graph parameters");
    model.verbose_on();
    model.run(100, 1231).expect("run to completion");

    // Wide epicurve, one row per day.
    println!("day,susceptible,infected,recovered");
    let s = model.db().hist_total_of(0);
    let i = model.db().hist_total_of(1);
    let r = model.db().hist_total_of(2);
    for day in 0..s.len() {
        println!("{},{},{},{}", day, s[day], i[day], r[day]);
    }
}
