use std::fs::File;
use std::io::BufReader;

use clap::Parser;

use rpi_check::config::DEFAULT_NORMS;
use rpi_check::{
    compute_rpi, grade_of, read_bulk, tally_dimension_scores, Error, QuestionBank, TestKind,
};

/// 批量计分：CSV 每行首列为样本标识，其余各列按题序给出选项编号。
#[derive(Parser)]
struct Args {
    path: String,
    /// 测试视角：self 或 lover
    #[arg(long, default_value = "self")]
    test_type: String,
    /// 题库文件路径
    #[arg(long, default_value = "resources/questionBank.json")]
    bank: String,
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let args = Args::parse();
    let kind: TestKind = args.test_type.parse()?;

    let bank = QuestionBank::load(&args.bank)?;
    let questions = bank.questions(kind);
    if questions.is_empty() {
        return Err(Error::BankFormat);
    }

    let reader = BufReader::new(File::open(&args.path)?);
    for row in read_bulk(reader, &questions) {
        match row {
            Ok((id, answers)) => {
                let scores = tally_dimension_scores(&questions, &answers);
                let result = compute_rpi(&scores, &DEFAULT_NORMS);
                let grade = grade_of(result.rpi);
                println!(
                    "id = {}, rpi = {:.2}, compositeZ = {:.3}, 等级 = {}",
                    id, result.rpi, result.composite_z, grade.level
                );
            }
            Err(e) => {
                eprintln!("跳过异常行: {}", e);
            }
        }
    }
    Ok(())
}
