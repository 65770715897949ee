use std::io::{stdin, stdout, Write};

use chrono::Utc;
use clap::Parser;

use rpi_check::config::{auth_link, DEFAULT_NORMS};
use rpi_check::report::render_text;
use rpi_check::{
    filter_records, format_date, verify_auth_code, CodeStatus, Error, FileStore, LocalOracle,
    QuestionBank, RecordFilter, Storage, TestKind, TestSession,
};

/// 恋爱占有欲指数（RPI）测试命令行入口。
/// 只做输入输出编排，全部判定逻辑在库里。
#[derive(Parser)]
#[command(about = "恋爱占有欲指数（RPI）测试")]
struct Args {
    /// 测试视角：self（给自己测）或 lover（为恋人测）
    #[arg(long, default_value = "self")]
    test_type: String,
    /// 题库文件路径
    #[arg(long, default_value = "resources/questionBank.json")]
    bank: String,
    /// 本地存储文件路径
    #[arg(long, default_value = "rpi_store.json")]
    store: String,
    /// 列出既有测试记录后退出
    #[arg(long)]
    records: bool,
    /// 按编号查看既有报告后退出
    #[arg(long)]
    report: Option<String>,
    /// 按编号删除测试记录后退出
    #[arg(long)]
    delete: Option<String>,
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let args = Args::parse();
    let kind: TestKind = args.test_type.parse()?;
    let mut storage = Storage::new(FileStore::open(&args.store)?);
    let now = Utc::now();

    if args.records {
        return list_records(&storage);
    }
    if let Some(id) = args.report {
        let record = storage.record(&id).ok_or(Error::RecordNotFound(id))?;
        println!("{}", render_text(&record));
        return Ok(());
    }
    if let Some(id) = args.delete {
        if storage.record(&id).is_none() {
            return Err(Error::RecordNotFound(id));
        }
        storage.delete_record(&id)?;
        println!("测试记录已删除: {}", id);
        return Ok(());
    }

    if !storage.check_storage_space() {
        eprintln!("警告：本地存储空间不足，答题进度可能无法保存。");
    }

    // 题库优先读缓存，首次从文件加载并写入缓存
    let bank = match storage.question_bank() {
        Some(bank) => bank,
        None => {
            let bank = QuestionBank::load(&args.bank)?;
            if let Err(e) = storage.save_question_bank(&bank) {
                eprintln!("警告：题库缓存写入失败: {}", e);
            }
            bank
        }
    };
    let questions = bank.questions(kind);
    if questions.is_empty() {
        return Err(Error::BankFormat);
    }

    let mut buffer = String::new();

    // 授权码验证，格式错误可重试，过期/已使用直接终止
    let (code, status) = loop {
        print!("请输入 10 位授权码: ");
        stdout().flush()?;
        buffer.clear();
        stdin().read_line(&mut buffer)?;
        let code = buffer.trim().to_string();

        let status = verify_auth_code(
            &mut storage,
            &LocalOracle,
            &code,
            kind,
            questions.len(),
            now,
        )?;
        if status.is_valid() {
            break (code, status);
        }
        if let Some(message) = status.message() {
            println!("{}", message);
        }
        if matches!(status, CodeStatus::Expired | CodeStatus::Used) {
            let link = auth_link(&mut storage, now);
            if !link.is_empty() {
                println!("获取新授权码: {}", link);
            }
            return Ok(());
        }
    };

    let mut session = match status {
        CodeStatus::Partial { answered } => {
            println!("检测到未完成测试（已答 {} 题）。输入 y 恢复进度，其余任意键重新开始:", answered);
            buffer.clear();
            stdin().read_line(&mut buffer)?;
            if buffer.trim().eq_ignore_ascii_case("y") {
                TestSession::resume(&mut storage, &code, kind, questions)
            } else {
                TestSession::start(&mut storage, &code, kind, questions)
            }
        }
        _ => TestSession::start(&mut storage, &code, kind, questions),
    };

    loop {
        let question = match session.current() {
            Some(question) => question.clone(),
            None => break,
        };
        println!(
            "\n第 {} 题 / 共 {} 题  【{}】",
            session.cursor() + 1,
            session.total(),
            question.dimension
        );
        println!("{}", question.question_content);
        for option in &question.options {
            println!("  {} => {}", option.option_id, option.option_content);
        }
        if let Some(selected) = session.selected() {
            println!("  （当前已选 {}，重新输入可改选）", selected);
        }

        buffer.clear();
        stdin().read_line(&mut buffer)?;
        let input = buffer.trim();
        if input.eq_ignore_ascii_case("p") {
            session.back();
            continue;
        }

        let option_id = match input.parse::<u32>() {
            Ok(option_id) => option_id,
            Err(_) => {
                println!("请输入选项编号，或输入 p 返回上一题。");
                continue;
            }
        };
        if let Err(e) = session.answer(option_id) {
            println!("{}", e);
            continue;
        }
        match session.advance() {
            Ok(true) => {}
            // 末题已作答，进入提交
            Ok(false) => break,
            Err(e) => println!("{}", e),
        }
    }

    let record = session.submit(&DEFAULT_NORMS, &bank.question_bank_version, Utc::now())?;
    println!("\n{}", render_text(&record));
    println!("报告编号: {}（可用 --report 再次查看）", record.id);
    Ok(())
}

fn list_records<S: rpi_check::KvStore>(storage: &Storage<S>) -> Result<(), Error> {
    let records = filter_records(storage.records(), &RecordFilter::default(), Utc::now());
    if records.is_empty() {
        println!("暂无测试记录。");
        return Ok(());
    }
    for record in records {
        println!(
            "{}  {}  RPI {:.2}  {}  授权码尾号 {}",
            record.id,
            record.test_type.display_name(),
            record.rpi_result.rpi,
            format_date(record.created_at),
            &record.auth_code[record.auth_code.len().saturating_sub(4)..]
        );
    }
    Ok(())
}
